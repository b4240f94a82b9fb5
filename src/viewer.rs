//! Static viewer page and assets.
//!
//! When a static directory is configured, this module serves:
//! - `/` - the viewer page (`index.html`)
//! - `/static/*path` - assets (JS, CSS, etc.)

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use tokio::fs;

/// Create the viewer router.
///
/// Returns None if static_dir is not configured or does not exist.
pub fn router(static_dir: Option<PathBuf>) -> Option<Router> {
    let static_dir = static_dir?;

    if !static_dir.exists() {
        tracing::warn!("Static directory does not exist: {}", static_dir.display());
        return None;
    }

    tracing::info!("Serving viewer from: {}", static_dir.display());

    let index_dir = static_dir.clone();

    Some(
        Router::new()
            .route("/", get(move || serve_index(index_dir.clone())))
            .route(
                "/static/*path",
                get(move |Path(path): Path<String>| serve_static(static_dir.clone(), path)),
            ),
    )
}

async fn serve_index(static_dir: PathBuf) -> Response {
    let path = static_dir.join("index.html");

    match fs::read(&path).await {
        Ok(content) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            content,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to read index.html: {}", e);
            (StatusCode::NOT_FOUND, "Viewer not found").into_response()
        }
    }
}

async fn serve_static(static_dir: PathBuf, path: String) -> Response {
    // Sanitize path to prevent directory traversal
    let clean_path = path.trim_start_matches('/');
    if clean_path.contains("..") {
        return (StatusCode::BAD_REQUEST, "Invalid path").into_response();
    }

    let file_path = static_dir.join(clean_path);

    match fs::read(&file_path).await {
        Ok(content) => (
            [(header::CONTENT_TYPE, guess_content_type(&file_path))],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

fn guess_content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
