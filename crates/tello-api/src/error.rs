//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tello_link::{CommandError, ModeError, StreamError};

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 Not Found
    NotFound(String),
    /// 503 Service Unavailable
    ServiceUnavailable(String),
    /// 500 Internal Server Error
    Internal(String),
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Mode(ModeError::NotEngaged) => ApiError::BadRequest(err.to_string()),
            CommandError::Mode(ModeError::EntryFailed) | CommandError::SendFailed => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<ModeError> for ApiError {
    fn from(err: ModeError) -> Self {
        CommandError::from(err).into()
    }
}

/// Every stream start failure is reported to the caller as a bad request
impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Background task failed: {}", err))
    }
}
