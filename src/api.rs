use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::file::{FileError, WatchedFile};

#[derive(Clone)]
pub struct ApiState {
    pub file: WatchedFile,
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub fn router(file: WatchedFile) -> Router {
    Router::new()
        .route("/clear", post(clear_file))
        .route("/snapshot", get(get_snapshot))
        .with_state(ApiState { file })
}

/// Empty the watched file. Viewers see the empty content on their next poll.
async fn clear_file(State(state): State<ApiState>) -> Result<StatusCode, FileError> {
    state.file.truncate().await?;
    tracing::info!(path = %state.file.path().display(), "Watched file cleared");
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct SnapshotResponse {
    content: String,
    /// Same encoding as the `lastMod` connect parameter
    #[serde(rename = "lastMod")]
    last_mod: String,
}

/// Current content plus the checkpoint to open a stream from.
async fn get_snapshot(State(state): State<ApiState>) -> Result<Json<SnapshotResponse>, FileError> {
    let (data, modified) = state.file.snapshot().await?;
    Ok(Json(SnapshotResponse {
        content: String::from_utf8_lossy(&data).into_owned(),
        last_mod: modified.to_hex(),
    }))
}
