//! tello-link - command channel and video ingestion for Tello drones
//!
//! This crate owns everything that talks to the drone: the UDP command
//! socket and its reply listener, the command-mode gate, the video capture
//! thread with its latest-frame cache, and the operator log all of them
//! write to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DroneSession                           │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │ ModeGate    │  │ VideoIngest │  │ LogSink             │ │
//! │  │ (cmd mode)  │  │ (frames)    │  │ (operator log)      │ │
//! │  └──────┬──────┘  └──────┬──────┘  └─────────────────────┘ │
//! │         │  streamon/off  │                                  │
//! │         └───────┬────────┘                                  │
//! │          ┌──────┴──────┐                                    │
//! │          │CommandChannel│  UDP :9000 ⇄ drone :8889          │
//! │          │ + receiver   │                                    │
//! │          └─────────────┘                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Background work runs on plain OS threads; shared state sits behind
//! `parking_lot` locks or atomics, one per resource.
//!
//! # Example
//!
//! ```no_run
//! use tello_link::{DroneSession, TelloConfig};
//!
//! let session = DroneSession::new(&TelloConfig::default(), tello_link::video::default_decoder());
//! session.gate().ensure_command_mode()?;
//! session.gate().send("takeoff")?;
//! for line in session.log().read_from(0).lines {
//!     println!("{line}");
//! }
//! session.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod log;
pub mod mode;
pub mod session;
pub mod video;

pub use channel::{ChannelState, CommandChannel};
pub use command::MoveDirection;
pub use config::{DroneConfig, LogConfig, ServerConfig, TelloConfig, VideoConfig};
pub use error::{CommandError, ConfigError, DecodeError, ModeError, StreamError, TransportError};
pub use log::{Direction, LogEntry, LogPage, LogSink};
pub use mode::{EngageStatus, ModeGate};
pub use session::DroneSession;
pub use video::{Frame, RawFrame, StreamState, VideoDecoder, VideoIngest, VideoStatus};
