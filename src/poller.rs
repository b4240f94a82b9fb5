//! Fixed-interval change detection for one stream session.

use crate::file::{ChangeEvent, Checkpoint, WatchedFile};
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Drives [`WatchedFile::read_if_modified`] once per tick.
///
/// The first tick fires immediately. Ticks missed while the owner was busy
/// are skipped rather than replayed, so there is never a backlog.
pub struct ChangePoller {
    file: WatchedFile,
    interval: Interval,
}

impl ChangePoller {
    pub fn new(file: WatchedFile, period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { file, interval }
    }

    /// Wait for the next tick that produces content or an error.
    ///
    /// Ticks where the file is unchanged yield nothing. Dropping the returned
    /// future loses at most the check in progress; since the checkpoint only
    /// moves when the caller consumes an event, that check is simply redone
    /// on the next tick.
    pub async fn next(&mut self, checkpoint: Checkpoint) -> ChangeEvent {
        loop {
            self.interval.tick().await;
            match self.file.read_if_modified(checkpoint).await {
                ChangeEvent::Unchanged => continue,
                event => return event,
            }
        }
    }
}
