//! Command-mode gate
//!
//! The drone ignores flight commands until it has accepted `command`. The
//! gate remembers whether that happened and refuses to put any other command
//! on the wire before it has.
//!
//! ```text
//! Disengaged --(ensure_command_mode ok)--> Engaged
//! Engaged    --(reset)-------------------> Disengaged
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::channel::CommandChannel;
use crate::command::{MoveDirection, COMMAND};
use crate::error::{CommandError, ModeError};
use crate::log::LogSink;

/// Successful outcome of [`ModeGate::ensure_command_mode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngageStatus {
    /// `command` was sent just now
    Engaged,
    /// Already engaged; nothing was sent
    AlreadyActive,
}

impl fmt::Display for EngageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngageStatus::Engaged => f.write_str("Command mode engaged."),
            EngageStatus::AlreadyActive => f.write_str("Command mode already active."),
        }
    }
}

pub struct ModeGate {
    channel: Arc<CommandChannel>,
    log: LogSink,
    engaged: Mutex<bool>,
}

impl ModeGate {
    pub fn new(channel: Arc<CommandChannel>, log: LogSink) -> Self {
        Self {
            channel,
            log,
            engaged: Mutex::new(false),
        }
    }

    /// Enter command mode unless already there.
    ///
    /// The flag lock is held across the send so concurrent callers put at
    /// most one `command` datagram on the wire.
    pub fn ensure_command_mode(&self) -> Result<EngageStatus, ModeError> {
        let mut engaged = self.engaged.lock();
        if *engaged {
            return Ok(EngageStatus::AlreadyActive);
        }

        if self.channel.send_command(COMMAND) {
            *engaged = true;
            self.log.info("Command mode engaged.");
            Ok(EngageStatus::Engaged)
        } else {
            self.log.warn("Failed to engage command mode.");
            Err(ModeError::EntryFailed)
        }
    }

    pub fn in_command_mode(&self) -> bool {
        *self.engaged.lock()
    }

    /// Send any command through the gate.
    ///
    /// `command` itself is routed to [`ensure_command_mode`](Self::ensure_command_mode);
    /// everything else is refused while disengaged without touching the socket.
    pub fn send(&self, text: &str) -> Result<(), CommandError> {
        let text = text.trim();
        if text == COMMAND {
            self.ensure_command_mode()?;
            return Ok(());
        }

        if !self.in_command_mode() {
            debug!(command = text, "Rejected: not in command mode");
            return Err(ModeError::NotEngaged.into());
        }

        if self.channel.send_command(text) {
            Ok(())
        } else {
            Err(CommandError::SendFailed)
        }
    }

    /// Send `<direction> <move_distance_cm>`
    pub fn send_move(&self, direction: MoveDirection) -> Result<(), CommandError> {
        let distance = self.channel.config().move_distance_cm;
        self.send(&direction.command(distance))
    }

    /// Forget command mode (network switch or disconnect)
    pub fn reset(&self) {
        *self.engaged.lock() = false;
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }
}
