//! Tello SDK command vocabulary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Enters SDK command mode; must be acknowledged before flight commands
pub const COMMAND: &str = "command";
pub const TAKEOFF: &str = "takeoff";
pub const LAND: &str = "land";
/// Starts the drone-side video transmission
pub const STREAM_ON: &str = "streamon";
/// Stops the drone-side video transmission
pub const STREAM_OFF: &str = "streamoff";

/// Horizontal move directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Left,
    Right,
    Forward,
    Back,
}

impl MoveDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
            MoveDirection::Forward => "forward",
            MoveDirection::Back => "back",
        }
    }

    /// Capitalized name for operator messages ("Left sent.")
    pub fn title(&self) -> &'static str {
        match self {
            MoveDirection::Left => "Left",
            MoveDirection::Right => "Right",
            MoveDirection::Forward => "Forward",
            MoveDirection::Back => "Back",
        }
    }

    /// Wire command, e.g. `left 50`
    pub fn command(&self, distance_cm: u32) -> String {
        format!("{} {}", self.as_str(), distance_cm)
    }
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown direction keyword
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid direction: {0}")]
pub struct ParseDirectionError(pub String);

impl FromStr for MoveDirection {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "left" => Ok(MoveDirection::Left),
            "right" => Ok(MoveDirection::Right),
            "forward" => Ok(MoveDirection::Forward),
            "back" => Ok(MoveDirection::Back),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}
