//! Link configuration
//!
//! Every section has serde defaults so a partial TOML file (or none at all)
//! yields the stock Tello addressing.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelloConfig {
    /// Command channel settings
    #[serde(default)]
    pub drone: DroneConfig,
    /// Video ingestion settings
    #[serde(default)]
    pub video: VideoConfig,
    /// Log sink settings
    #[serde(default)]
    pub log: LogConfig,
    /// HTTP server settings (used by the daemon)
    #[serde(default)]
    pub server: ServerConfig,
}

impl TelloConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

// =============================================================================
// Command channel
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneConfig {
    /// Drone command address (SDK port)
    #[serde(default = "default_drone_address")]
    pub address: SocketAddr,
    /// Local UDP port replies arrive on
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Receive timeout of the listener; bounds how long stop() can take
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Distance in centimeters for move commands
    #[serde(default = "default_move_distance_cm")]
    pub move_distance_cm: u32,
}

fn default_drone_address() -> SocketAddr {
    SocketAddr::from(([192, 168, 10, 1], 8889))
}

fn default_local_port() -> u16 {
    9000
}

fn default_receive_timeout_ms() -> u64 {
    2000
}

fn default_move_distance_cm() -> u32 {
    50
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            address: default_drone_address(),
            local_port: default_local_port(),
            receive_timeout_ms: default_receive_timeout_ms(),
            move_distance_cm: default_move_distance_cm(),
        }
    }
}

impl DroneConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

// =============================================================================
// Video
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Stream URL handed to the decoder
    #[serde(default = "default_video_source")]
    pub source: String,
    /// How long stop() waits for the capture thread
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    /// Pause after a failed frame read
    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,
    /// Pause after a failed JPEG encode
    #[serde(default = "default_encode_retry_ms")]
    pub encode_retry_ms: u64,
    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_video_source() -> String {
    "udp://@0.0.0.0:11111".to_string()
}

fn default_join_timeout_ms() -> u64 {
    1000
}

fn default_read_retry_ms() -> u64 {
    50
}

fn default_encode_retry_ms() -> u64 {
    10
}

fn default_jpeg_quality() -> u8 {
    80
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: default_video_source(),
            join_timeout_ms: default_join_timeout_ms(),
            read_retry_ms: default_read_retry_ms(),
            encode_retry_ms: default_encode_retry_ms(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

// =============================================================================
// Log
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Maximum number of retained log lines
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

fn default_log_capacity() -> usize {
    10_000
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

// =============================================================================
// HTTP server
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
