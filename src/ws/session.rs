//! Per-connection stream state.

use crate::file::{ChangeEvent, Checkpoint};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique session ID.
pub type SessionId = Uuid;

/// Error that ends a stream session.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("inbound frame of {size} bytes exceeds limit of {limit}")]
    ProtocolViolation { size: usize, limit: usize },
    #[error("no inbound traffic for {0:?}")]
    LivenessTimeout(Duration),
    #[error("inbound task ended abnormally: {0}")]
    InboundTask(#[from] tokio::task::JoinError),
}

/// Why a session left the `Active` state.
#[derive(Debug)]
pub enum CloseReason {
    /// The viewer closed the connection or the stream ended.
    PeerClosed,
    Failed(StreamError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("peer closed"),
            CloseReason::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Per-connection state.
#[derive(Debug)]
pub struct StreamSession {
    /// Server-generated ID, used in logs
    id: SessionId,

    state: SessionState,

    /// Timestamp of the last content the viewer is known to have
    checkpoint: Checkpoint,

    /// Last error text sent, so a standing error is only sent once
    last_error: Option<String>,

    close_reason: Option<CloseReason>,
}

impl StreamSession {
    /// Create a session from the viewer's optional `lastMod` value.
    pub fn connect(last_mod: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            checkpoint: Checkpoint::from_query(last_mod),
            last_error: None,
            close_reason: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    pub fn activate(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Active;
        }
    }

    /// Fold a change event into the session and return the text to push to
    /// the viewer, if any.
    ///
    /// Content always goes out and clears the error state. An error goes out
    /// only when its text differs from the previous one sent.
    pub fn on_change(&mut self, event: ChangeEvent) -> Option<String> {
        if self.state != SessionState::Active {
            return None;
        }
        match event {
            ChangeEvent::Unchanged => None,
            ChangeEvent::Content { data, modified } => {
                self.last_error = None;
                self.checkpoint = self.checkpoint.max(modified);
                Some(String::from_utf8_lossy(&data).into_owned())
            }
            ChangeEvent::Error { error, .. } => {
                let message = error.to_string();
                if self.last_error.as_deref() == Some(message.as_str()) {
                    return None;
                }
                self.last_error = Some(message.clone());
                Some(message)
            }
        }
    }

    /// Enter `Closing`. The first reason recorded wins.
    pub fn close(&mut self, reason: CloseReason) {
        if self.state < SessionState::Closing {
            self.state = SessionState::Closing;
            self.close_reason = Some(reason);
        }
    }

    pub fn finish(&mut self) {
        self.state = SessionState::Closed;
    }
}
