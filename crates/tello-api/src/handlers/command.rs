//! Command and move handlers
//!
//! - POST /api/command - send a raw SDK command (`command` enters command mode)
//! - POST /api/move    - send a fixed-distance horizontal move

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use tello_link::command::COMMAND;
use tello_link::MoveDirection;

use super::{json_body, ActionResponse};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub direction: Option<String>,
}

/// POST /api/command
pub async fn send_command(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let request: CommandRequest = json_body(&body)?;
    let command = request.command.unwrap_or_default().trim().to_string();
    if command.is_empty() {
        return Err(ApiError::BadRequest("Command required".to_string()));
    }

    // The gate may wait on a socket being closed by a concurrent reset
    let session = state.session().clone();
    let message = tokio::task::spawn_blocking(move || -> Result<String, ApiError> {
        let gate = session.gate();
        if command == COMMAND {
            return Ok(gate.ensure_command_mode()?.to_string());
        }
        gate.send(&command)?;
        Ok("Command sent.".to_string())
    })
    .await??;

    Ok(Json(ActionResponse::ok(message)))
}

/// POST /api/move
pub async fn send_move(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let request: MoveRequest = json_body(&body)?;
    let direction: MoveDirection = request
        .direction
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid direction".to_string()))?;

    let session = state.session().clone();
    tokio::task::spawn_blocking(move || session.gate().send_move(direction)).await??;
    Ok(Json(ActionResponse::ok(format!("{} sent.", direction.title()))))
}
