pub mod api;
pub mod cli;
pub mod config;
pub mod file;
pub mod poller;
pub mod viewer;
pub mod ws;

use axum::{routing::get, Router};
use config::StreamConfig;
use file::{FileError, WatchedFile};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn health_check() -> &'static str {
    "OK"
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot open watched file: {0}")]
    File(#[from] FileError),
    #[error("invalid listen address {addr}: {source}")]
    Address {
        addr: String,
        source: std::net::AddrParseError,
    },
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Configuration for creating a router.
pub struct RouterConfig {
    /// The file streamed to viewers
    pub file: WatchedFile,
    /// Timing and limits for stream sessions
    pub stream: StreamConfig,
    /// Directory with the viewer page (optional)
    pub static_dir: Option<PathBuf>,
}

impl RouterConfig {
    pub fn new(file: WatchedFile) -> Self {
        Self {
            file,
            stream: StreamConfig::default(),
            static_dir: None,
        }
    }
}

/// Create a router with the given configuration.
pub fn create_router(config: RouterConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(config.file.clone()))
        .merge(ws::router(config.file, config.stream));

    if let Some(viewer) = viewer::router(config.static_dir) {
        router = router.merge(viewer);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
