//! Timing and size limits for stream sessions.

use std::time::Duration;

/// Largest inbound frame a viewer may send.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Per-session stream settings, shared by every connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// How often the watched file is checked for changes.
    pub poll_interval: Duration,
    /// How long a connection may stay silent before it is considered dead.
    pub pong_wait: Duration,
    /// Deadline for a single outbound write.
    pub write_wait: Duration,
    /// Inbound frames larger than this close the session.
    pub max_message_size: usize,
}

impl StreamConfig {
    /// Liveness probes go out at 9/10 of the pong wait so an answer can
    /// arrive before the read deadline lapses.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}
