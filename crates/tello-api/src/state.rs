//! Application state for the drone API

use std::sync::Arc;

use tello_link::DroneSession;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    session: Arc<DroneSession>,
}

impl AppState {
    pub fn new(session: Arc<DroneSession>) -> Self {
        Self { session }
    }

    /// The drone session every handler talks to
    pub fn session(&self) -> &Arc<DroneSession> {
        &self.session
    }
}
