//! Video handlers
//!
//! - POST /api/video/start - turn the stream on and start capturing
//! - GET  /video.jpg       - freshest JPEG frame

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::ActionResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/video/start
pub async fn start_video(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    let session = state.session().clone();
    // May reap a previous capture thread
    let status = tokio::task::spawn_blocking(move || session.video().start()).await??;
    Ok(Json(ActionResponse::ok(status.to_string())))
}

/// GET /video.jpg
pub async fn latest_frame(State(state): State<AppState>) -> Result<Response, ApiError> {
    let frame = state
        .session()
        .video()
        .frame()
        .ok_or_else(|| ApiError::ServiceUnavailable("Video not ready".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        frame,
    )
        .into_response())
}
