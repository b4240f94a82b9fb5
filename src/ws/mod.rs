//! WebSocket module for live file streaming.
//!
//! Provides the endpoint at `/ws`. Viewers may pass `?lastMod=<hex>` to resume
//! from the last content they saw; the server pushes the full file as a text
//! frame whenever it changes, an error text when it cannot be read, and a
//! ping as liveness probe.

pub mod handler;
pub mod liveness;
pub mod session;

use crate::config::StreamConfig;
use crate::file::WatchedFile;
use axum::routing::get;
use axum::Router;

/// WebSocket state shared across handlers.
#[derive(Clone)]
pub struct WsState {
    pub file: WatchedFile,
    pub config: StreamConfig,
}

/// Create the WebSocket router.
pub fn router(file: WatchedFile, config: StreamConfig) -> Router {
    Router::new()
        .route("/ws", get(handler::ws_handler))
        .with_state(WsState { file, config })
}
