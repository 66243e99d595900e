//! Session handlers
//!
//! - POST /api/session/reset - stop video, close the socket, forget command mode
//! - GET  /api/status        - snapshot of the session state

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ActionResponse;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub command_mode: bool,
    pub listening: bool,
    pub streaming: bool,
    pub stream_enabled: bool,
}

/// POST /api/session/reset
pub async fn reset_session(
    State(state): State<AppState>,
) -> Result<Json<ActionResponse>, ApiError> {
    let session = state.session().clone();
    tokio::task::spawn_blocking(move || session.reset()).await?;
    Ok(Json(ActionResponse::ok("Session reset.")))
}

/// GET /api/status
///
/// Every field takes a lock that start/stop may hold across a thread join.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let session = state.session().clone();
    let status = tokio::task::spawn_blocking(move || StatusResponse {
        command_mode: session.gate().in_command_mode(),
        listening: session.channel().is_listening(),
        streaming: session.video().is_streaming(),
        stream_enabled: session.video().stream_enabled(),
    })
    .await?;
    Ok(Json(status))
}
