//! Error taxonomy for the drone link
//!
//! Transport and stream failures are caught at the boundary of the component
//! that owns the resource. The `Display` text of the user-facing variants is
//! the short message shown to operators, so callers can forward it verbatim.

use thiserror::Error;

/// UDP socket errors
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Socket closed")]
    Closed,
}

/// Command-mode precondition errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ModeError {
    /// A flight command was attempted before the drone acknowledged command mode
    #[error("Enter command mode first.")]
    NotEngaged,

    /// The `command` datagram could not be sent
    #[error("Unable to enter command mode.")]
    EntryFailed,
}

/// Result of a gated command send
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Mode(#[from] ModeError),

    /// Transport failure; the cause is already in the log
    #[error("Send failed.")]
    SendFailed,
}

/// Video stream start/open errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("{0} not installed. Video disabled.")]
    DecoderUnavailable(String),

    #[error("Enter command mode before starting the video stream.")]
    CommandModeRequired,

    #[error("Drone rejected the streamon command.")]
    StreamOnRejected,

    #[error("Unable to open the video stream: {0}")]
    SourceOpen(String),

    #[error("Invalid video source: {0}")]
    InvalidSource(String),
}

/// Per-frame failures, recovered inside the capture loop
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Frame encode failed: {0}")]
    Encode(String),

    #[error("Capture source closed")]
    Closed,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        assert_eq!(ModeError::NotEngaged.to_string(), "Enter command mode first.");
        assert_eq!(
            CommandError::from(ModeError::EntryFailed).to_string(),
            "Unable to enter command mode."
        );
        assert_eq!(
            StreamError::DecoderUnavailable("OpenH264".to_string()).to_string(),
            "OpenH264 not installed. Video disabled."
        );
    }
}
