//! Mock video decoder for tests and drone-less demo runs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::decoder::{FrameCapture, RawFrame, VideoDecoder};
use crate::error::{DecodeError, StreamError};

#[derive(Default)]
struct MockShared {
    frames: Mutex<VecDeque<RawFrame>>,
    fail_open: AtomicBool,
    open_delay_ms: AtomicU64,
    opened: AtomicUsize,
    live: AtomicUsize,
}

/// Decoder that replays queued frames.
///
/// With no queued frames a read fails like a live feed that has nothing yet,
/// unless a test pattern was configured.
#[derive(Clone, Default)]
pub struct MockVideoDecoder {
    shared: Arc<MockShared>,
    pattern: Option<(u32, u32)>,
}

impl MockVideoDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a colour-cycling frame roughly 30 times a second whenever
    /// the queue is empty
    pub fn with_pattern(width: u32, height: u32) -> Self {
        Self {
            shared: Arc::default(),
            pattern: Some((width, height)),
        }
    }

    /// Queue a frame for the next read
    pub fn push_frame(&self, frame: RawFrame) {
        self.shared.frames.lock().push_back(frame);
    }

    /// Make subsequent `open()` calls fail
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `open()` calls block for `delay` first, like a stream
    /// that is slow to connect. Each call uses the delay and failure setting
    /// in effect when it began.
    pub fn set_open_delay(&self, delay: Duration) {
        self.shared
            .open_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful `open()` calls
    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Capture handles currently alive
    pub fn live_captures(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Frames still waiting to be read
    pub fn pending(&self) -> usize {
        self.shared.frames.lock().len()
    }
}

impl VideoDecoder for MockVideoDecoder {
    fn name(&self) -> &str {
        "Mock decoder"
    }

    fn open(&self, source: &str) -> Result<Box<dyn FrameCapture>, StreamError> {
        let fail = self.shared.fail_open.load(Ordering::SeqCst);
        let delay = self.shared.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if fail {
            return Err(StreamError::SourceOpen(format!("{}: mock open failure", source)));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCapture {
            shared: self.shared.clone(),
            pattern: self.pattern,
            tick: 0,
        }))
    }
}

struct MockCapture {
    shared: Arc<MockShared>,
    pattern: Option<(u32, u32)>,
    tick: u8,
}

impl FrameCapture for MockCapture {
    fn read_frame(&mut self) -> Result<RawFrame, DecodeError> {
        if let Some(frame) = self.shared.frames.lock().pop_front() {
            return Ok(frame);
        }

        match self.pattern {
            Some((width, height)) => {
                std::thread::sleep(Duration::from_millis(33));
                self.tick = self.tick.wrapping_add(4);
                Ok(RawFrame::solid(
                    width,
                    height,
                    [self.tick, 255 - self.tick, 128],
                ))
            }
            None => Err(DecodeError::Read("no frame available".to_string())),
        }
    }
}

impl Drop for MockCapture {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}
