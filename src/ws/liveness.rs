//! Keepalive probing and dead-connection detection.
//!
//! The outbound side sends a probe every `ping_period`. The inbound side
//! holds a read deadline that every frame (including probe answers) pushes
//! out by `pong_wait`; if the deadline passes with nothing read, the
//! connection is dead.

use crate::config::StreamConfig;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Liveness as seen from the inbound side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    /// Traffic seen within the last probe period.
    Alive,
    /// A probe should be out; waiting for any answer.
    AwaitingPong,
    /// Read deadline passed.
    Dead,
}

/// Read-deadline tracker for one connection.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    pong_wait: Duration,
    ping_period: Duration,
    last_seen: Instant,
}

impl Liveness {
    /// Start tracking; the deadline begins at connect time.
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            pong_wait: config.pong_wait,
            ping_period: config.ping_period(),
            last_seen: Instant::now(),
        }
    }

    pub fn pong_wait(&self) -> Duration {
        self.pong_wait
    }

    /// Record inbound traffic.
    pub fn refresh(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Instant by which the next inbound frame must arrive.
    pub fn deadline(&self) -> Instant {
        self.last_seen + self.pong_wait
    }

    pub fn state_at(&self, now: Instant) -> LivenessState {
        if now >= self.deadline() {
            LivenessState::Dead
        } else if now >= self.last_seen + self.ping_period {
            LivenessState::AwaitingPong
        } else {
            LivenessState::Alive
        }
    }

    /// Probe timer for the outbound side. The first probe goes out one
    /// period after connect, not immediately.
    pub fn probe_interval(&self) -> Interval {
        let mut interval = time::interval_at(Instant::now() + self.ping_period, self.ping_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }
}
