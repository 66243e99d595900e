//! Video ingestion
//!
//! A background capture thread pulls frames from the drone's video feed,
//! encodes each one as JPEG and keeps only the newest. There is no queue:
//! readers always get the freshest frame and intermediate frames are simply
//! overwritten. The cached frame survives `stop()` until a new one replaces
//! it.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 VideoIngest                   │
//! │                                               │
//! │  start() ──▶ ModeGate check ──▶ streamon      │
//! │                  │                            │
//! │          ┌───────┴────────┐                   │
//! │          │ capture thread │── VideoDecoder    │
//! │          └───────┬────────┘   (injected)      │
//! │                  ▼                            │
//! │            FrameCache (1 slot)  ◀── frame()   │
//! └───────────────────────────────────────────────┘
//! ```

pub mod decoder;
#[cfg(feature = "h264")]
pub mod h264;
pub mod mock;

pub use decoder::{parse_udp_source, FrameCapture, RawFrame, VideoDecoder};
#[cfg(feature = "h264")]
pub use h264::H264UdpDecoder;
pub use mock::MockVideoDecoder;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::channel::{join_until, CommandChannel};
use crate::command::{STREAM_OFF, STREAM_ON};
use crate::config::VideoConfig;
use crate::error::{DecodeError, StreamError};
use crate::log::LogSink;
use crate::mode::ModeGate;

/// Capability reported when the crate was built without a decoder
pub const DEFAULT_DECODER_NAME: &str = "OpenH264";

/// The decoder this build ships with, if any
pub fn default_decoder() -> Option<Arc<dyn VideoDecoder>> {
    #[cfg(feature = "h264")]
    {
        Some(Arc::new(H264UdpDecoder))
    }
    #[cfg(not(feature = "h264"))]
    {
        None
    }
}

/// Successful outcome of [`VideoIngest::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    Starting,
    AlreadyRunning,
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoStatus::Starting => f.write_str("Video stream starting."),
            VideoStatus::AlreadyRunning => f.write_str("Video stream already running."),
        }
    }
}

/// Local capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
}

/// Most recently encoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG bytes
    pub data: Bytes,
    pub captured_at: Instant,
    /// 1 for the first frame cached by this ingest, then increasing
    pub sequence: u64,
}

/// Single-slot, last-write-wins frame cache
#[derive(Default)]
struct FrameCache {
    slot: Mutex<Option<Frame>>,
    sequence: AtomicU64,
}

impl FrameCache {
    fn store(&self, data: Vec<u8>) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        *self.slot.lock() = Some(Frame {
            data: Bytes::from(data),
            captured_at: Instant::now(),
            sequence,
        });
    }

    fn latest(&self) -> Option<Frame> {
        self.slot.lock().clone()
    }
}

struct CaptureThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Video feed ingestion for one drone
pub struct VideoIngest {
    channel: Arc<CommandChannel>,
    gate: Arc<ModeGate>,
    decoder: Option<Arc<dyn VideoDecoder>>,
    config: VideoConfig,
    log: LogSink,
    /// Whether `streamon` is in effect. Cleared by `stop()`, or by a capture
    /// thread whose source failed to open while it was still current.
    stream_enabled: Arc<Mutex<bool>>,
    cache: Arc<FrameCache>,
    /// Serializes start/stop and owns the capture thread
    capture: Mutex<Option<CaptureThread>>,
}

impl VideoIngest {
    pub fn new(
        channel: Arc<CommandChannel>,
        gate: Arc<ModeGate>,
        decoder: Option<Arc<dyn VideoDecoder>>,
        config: VideoConfig,
        log: LogSink,
    ) -> Self {
        Self {
            channel,
            gate,
            decoder,
            config,
            log,
            stream_enabled: Arc::new(Mutex::new(false)),
            cache: Arc::new(FrameCache::default()),
            capture: Mutex::new(None),
        }
    }

    /// Turn the drone's stream on (once per session) and start capturing
    pub fn start(&self) -> Result<VideoStatus, StreamError> {
        let Some(decoder) = self.decoder.clone() else {
            let err = StreamError::DecoderUnavailable(DEFAULT_DECODER_NAME.to_string());
            self.log.warn(err.to_string());
            return Err(err);
        };

        if !self.gate.in_command_mode() {
            self.log.warn("Video requested before command mode.");
            return Err(StreamError::CommandModeRequired);
        }

        // Lock order: capture, stream_enabled, channel.
        let mut capture = self.capture.lock();
        let mut stream_enabled = self.stream_enabled.lock();

        if !*stream_enabled {
            if !self.channel.send_command(STREAM_ON) {
                self.log.warn("Failed to send streamon command.");
                return Err(StreamError::StreamOnRejected);
            }
            *stream_enabled = true;
            self.log.info("Drone video stream enabled.");
        }

        // Checked under the stream lock: a failing worker clears its running
        // flag and stream_enabled together.
        if let Some(current) = capture.as_ref() {
            if current.running.load(Ordering::SeqCst) {
                return Ok(VideoStatus::AlreadyRunning);
            }
        }
        drop(stream_enabled);

        // A previous capture thread gave up on its own; reap it.
        if let Some(stale) = capture.take() {
            let deadline = Instant::now() + Duration::from_millis(self.config.join_timeout_ms);
            if join_until(stale.handle, deadline).is_err() {
                warn!("Previous capture thread still exiting; detaching");
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let worker = CaptureWorker {
            decoder,
            source: self.config.source.clone(),
            read_retry: Duration::from_millis(self.config.read_retry_ms),
            encode_retry: Duration::from_millis(self.config.encode_retry_ms),
            jpeg_quality: self.config.jpeg_quality,
            running: running.clone(),
            stream_enabled: self.stream_enabled.clone(),
            cache: self.cache.clone(),
            log: self.log.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("tello-video".to_string())
            .spawn(move || worker.run())
            .map_err(|e| StreamError::SourceOpen(format!("spawn capture thread: {}", e)))?;

        *capture = Some(CaptureThread { running, handle });
        Ok(VideoStatus::Starting)
    }

    /// JPEG bytes of the freshest frame; `None` until the first frame is encoded
    pub fn frame(&self) -> Option<Bytes> {
        self.cache.latest().map(|f| f.data)
    }

    /// Freshest frame with its capture time, for staleness checks
    pub fn latest(&self) -> Option<Frame> {
        self.cache.latest()
    }

    /// Stop capturing and turn the drone's stream off. The cached frame is kept.
    pub fn stop(&self) {
        let mut capture = self.capture.lock();

        if let Some(current) = capture.take() {
            current.running.store(false, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_millis(self.config.join_timeout_ms);
            if join_until(current.handle, deadline).is_err() {
                warn!("Capture thread did not stop in time; detaching");
            }
            debug!("Video capture stopped");
        }

        let mut stream_enabled = self.stream_enabled.lock();
        if std::mem::take(&mut *stream_enabled) {
            self.channel.send_command(STREAM_OFF);
        }
    }

    pub fn state(&self) -> StreamState {
        match self.capture.lock().as_ref() {
            Some(current) if current.running.load(Ordering::SeqCst) => StreamState::Streaming,
            _ => StreamState::Idle,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == StreamState::Streaming
    }

    /// Whether `streamon` is in effect
    pub fn stream_enabled(&self) -> bool {
        *self.stream_enabled.lock()
    }

    /// Whether a decoder was injected
    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }
}

impl Drop for VideoIngest {
    fn drop(&mut self) {
        if let Some(current) = self.capture.get_mut() {
            current.running.store(false, Ordering::SeqCst);
        }
    }
}

/// Everything the capture thread owns
struct CaptureWorker {
    decoder: Arc<dyn VideoDecoder>,
    source: String,
    read_retry: Duration,
    encode_retry: Duration,
    jpeg_quality: u8,
    running: Arc<AtomicBool>,
    stream_enabled: Arc<Mutex<bool>>,
    cache: Arc<FrameCache>,
    log: LogSink,
}

impl CaptureWorker {
    fn run(self) {
        self.log.info("Connecting to video feed...");

        let mut capture = match self.decoder.open(&self.source) {
            Ok(capture) => capture,
            Err(e) => {
                let message = if matches!(e, StreamError::SourceOpen(_)) {
                    e.to_string()
                } else {
                    format!("Unable to open the video stream: {}", e)
                };
                self.log.warn(message);
                // A stopped (possibly detached) worker must leave the flag to
                // whichever session now owns the stream.
                let mut stream_enabled = self.stream_enabled.lock();
                if self.running.swap(false, Ordering::SeqCst) {
                    *stream_enabled = false;
                }
                return;
            }
        };
        debug!(source = %self.source, decoder = self.decoder.name(), "Video feed open");

        while self.running.load(Ordering::SeqCst) {
            let raw = match capture.read_frame() {
                Ok(raw) => raw,
                Err(DecodeError::Closed) => {
                    self.log.warn("Video feed closed.");
                    break;
                }
                Err(e) => {
                    trace!(error = %e, "Frame read failed");
                    std::thread::sleep(self.read_retry);
                    continue;
                }
            };

            match encode_jpeg(&raw, self.jpeg_quality) {
                // A detached thread must not overwrite a newer session's frame
                Ok(jpeg) if self.running.load(Ordering::SeqCst) => self.cache.store(jpeg),
                Ok(_) => break,
                Err(e) => {
                    trace!(error = %e, "Frame encode failed");
                    std::thread::sleep(self.encode_retry);
                }
            }
        }

        drop(capture);
        self.running.store(false, Ordering::SeqCst);
        debug!("Capture loop exited");
    }
}

/// Encode an RGB frame as JPEG
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, DecodeError> {
    if frame.width == 0 || frame.height == 0 || !frame.is_consistent() {
        return Err(DecodeError::Encode(format!(
            "{}x{} frame with {} bytes",
            frame.width,
            frame.height,
            frame.rgb.len()
        )));
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| DecodeError::Encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_jpeg_with_soi_marker() {
        let jpeg = encode_jpeg(&RawFrame::solid(8, 8, [200, 10, 10]), 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn rejects_inconsistent_frames() {
        let frame = RawFrame {
            width: 4,
            height: 4,
            rgb: vec![0; 10],
        };
        assert!(matches!(encode_jpeg(&frame, 80), Err(DecodeError::Encode(_))));
        assert!(encode_jpeg(&RawFrame::solid(0, 4, [0, 0, 0]), 80).is_err());
    }

    #[test]
    fn cache_is_last_write_wins() {
        let cache = FrameCache::default();
        assert!(cache.latest().is_none());
        cache.store(vec![1]);
        cache.store(vec![2]);
        let frame = cache.latest().unwrap();
        assert_eq!(frame.data.as_ref(), &[2]);
        assert_eq!(frame.sequence, 2);
    }

    #[test]
    fn status_messages() {
        assert_eq!(VideoStatus::Starting.to_string(), "Video stream starting.");
        assert_eq!(
            VideoStatus::AlreadyRunning.to_string(),
            "Video stream already running."
        );
    }
}
