//! Operator log polling
//!
//! Clients keep the `next` index from each response and pass it back as
//! `from`, so every line is delivered exactly once.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tello_link::LogPage;

use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct LogsQuery {
    #[serde(default)]
    pub from: usize,
}

/// GET /api/logs?from=N
pub async fn read_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<LogPage> {
    Json(state.session().log().read_from(query.from))
}
