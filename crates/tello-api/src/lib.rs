//! tello-api - HTTP control surface for a drone session
//!
//! Exposes the command, move, video and log operations of a
//! [`tello_link::DroneSession`] as a small JSON API. Rendering a UI is left to
//! the client; the API only serves data.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tello_api::{create_router, AppState};
//! use tello_link::{DroneSession, TelloConfig};
//!
//! let session = Arc::new(DroneSession::new(&TelloConfig::default(), None));
//! let router = create_router(AppState::new(session));
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the drone API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Commands
        .route("/api/command", post(handlers::command::send_command))
        .route("/api/move", post(handlers::command::send_move))
        // Video
        .route("/api/video/start", post(handlers::video::start_video))
        .route("/video.jpg", get(handlers::video::latest_frame))
        // Session
        .route("/api/session/reset", post(handlers::session::reset_session))
        .route("/api/status", get(handlers::session::status))
        // Operator log
        .route("/api/logs", get(handlers::logs::read_logs))
        .fallback(|| async { ApiError::NotFound("Unknown endpoint".to_string()) })
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
