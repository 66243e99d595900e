//! Drone session
//!
//! Wires one log, command channel, mode gate and video ingest together.

use std::sync::Arc;

use tracing::info;

use crate::channel::CommandChannel;
use crate::config::TelloConfig;
use crate::log::LogSink;
use crate::mode::ModeGate;
use crate::video::{VideoDecoder, VideoIngest};

pub struct DroneSession {
    log: LogSink,
    channel: Arc<CommandChannel>,
    gate: Arc<ModeGate>,
    video: VideoIngest,
}

impl DroneSession {
    /// Build a session. Nothing touches the network until the first command.
    pub fn new(config: &TelloConfig, decoder: Option<Arc<dyn VideoDecoder>>) -> Self {
        let log = LogSink::new(config.log.capacity);
        let channel = Arc::new(CommandChannel::new(config.drone.clone(), log.clone()));
        let gate = Arc::new(ModeGate::new(channel.clone(), log.clone()));
        let video = VideoIngest::new(
            channel.clone(),
            gate.clone(),
            decoder,
            config.video.clone(),
            log.clone(),
        );

        Self {
            log,
            channel,
            gate,
            video,
        }
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }

    pub fn gate(&self) -> &Arc<ModeGate> {
        &self.gate
    }

    pub fn video(&self) -> &VideoIngest {
        &self.video
    }

    /// Drop back to a fresh session after a network switch or disconnect:
    /// video off, socket closed, command mode forgotten.
    pub fn reset(&self) {
        self.video.stop();
        self.channel.stop();
        self.gate.reset();
        info!("Drone session reset");
    }

    /// Release the video feed and the socket
    pub fn shutdown(&self) {
        self.video.stop();
        self.channel.stop();
    }
}
