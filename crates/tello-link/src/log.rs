//! Append-only operator log
//!
//! Every command sent, reply received and notable event is recorded here as
//! a timestamped line. Consumers poll with an absolute index and receive the
//! index to resume from, so each line is delivered once per poller.
//! Entries are also mirrored to `tracing`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;

/// Direction of a logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Datagram sent to the drone
    Sent,
    /// Datagram received from the drone
    Received,
    /// Local event
    Info,
}

/// One logged event
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    pub text: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.timestamp.format("%H:%M:%S");
        match self.direction {
            Direction::Sent => write!(f, "[{}] >>> {}", time, self.text),
            Direction::Received => write!(f, "[{}] <<< {}", time, self.text),
            Direction::Info => write!(f, "[{}] {}", time, self.text),
        }
    }
}

/// A batch of rendered lines and the index to poll from next
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogPage {
    pub lines: Vec<String>,
    pub next: usize,
}

struct LogBuffer {
    entries: VecDeque<LogEntry>,
    /// Absolute index of `entries[0]`
    first_index: usize,
    capacity: usize,
}

/// Shared handle to the log. Clones refer to the same buffer.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<LogBuffer>>,
}

impl LogSink {
    /// Create a log retaining at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogBuffer {
                entries: VecDeque::new(),
                first_index: 0,
                capacity: capacity.max(1),
            })),
        }
    }

    /// Record a sent command
    pub fn sent(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!(command = %text, ">>>");
        self.push(Direction::Sent, text);
    }

    /// Record a received reply
    pub fn received(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!(reply = %text, "<<<");
        self.push(Direction::Received, text);
    }

    /// Record a local event
    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("{}", text);
        self.push(Direction::Info, text);
    }

    /// Record a local failure
    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("{}", text);
        self.push(Direction::Info, text);
    }

    fn push(&self, direction: Direction, text: String) {
        let entry = LogEntry {
            timestamp: Local::now(),
            direction,
            text,
        };

        let mut buffer = self.inner.lock();
        if buffer.entries.len() == buffer.capacity {
            buffer.entries.pop_front();
            buffer.first_index += 1;
        }
        buffer.entries.push_back(entry);
    }

    /// Entries from absolute index `from` onwards.
    ///
    /// If `from` is older than the retained window, reading resumes at the
    /// oldest retained entry. `from` past the end yields nothing and echoes
    /// the current end.
    pub fn entries_from(&self, from: usize) -> (Vec<LogEntry>, usize) {
        let buffer = self.inner.lock();
        let end = buffer.first_index + buffer.entries.len();
        let start = from.max(buffer.first_index).min(end);
        let entries = buffer
            .entries
            .iter()
            .skip(start - buffer.first_index)
            .cloned()
            .collect();
        (entries, end)
    }

    /// Rendered lines from absolute index `from` onwards
    pub fn read_from(&self, from: usize) -> LogPage {
        let (entries, next) = self.entries_from(from);
        LogPage {
            lines: entries.iter().map(ToString::to_string).collect(),
            next,
        }
    }

    /// Absolute index one past the newest entry
    pub fn len(&self) -> usize {
        let buffer = self.inner.lock();
        buffer.first_index + buffer.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw texts of every retained entry with the given direction
    pub fn texts(&self, direction: Direction) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.direction == direction)
            .map(|e| e.text.clone())
            .collect()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(crate::config::LogConfig::default().capacity)
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_prefixed_by_direction() {
        let log = LogSink::new(16);
        log.sent("takeoff");
        log.received("ok");
        log.info("Socket closed.");

        let page = log.read_from(0);
        assert_eq!(page.next, 3);
        assert!(page.lines[0].ends_with("] >>> takeoff"));
        assert!(page.lines[1].ends_with("] <<< ok"));
        assert!(page.lines[2].ends_with("] Socket closed."));
        assert!(page.lines[0].starts_with('['));
    }

    #[test]
    fn polling_neither_repeats_nor_skips() {
        let log = LogSink::new(16);
        log.info("one");
        log.info("two");

        let first = log.read_from(0);
        assert_eq!(first.lines.len(), 2);

        log.info("three");
        let second = log.read_from(first.next);
        assert_eq!(second.lines.len(), 1);
        assert!(second.lines[0].ends_with("three"));

        let third = log.read_from(second.next);
        assert!(third.lines.is_empty());
        assert_eq!(third.next, second.next);
    }

    #[test]
    fn eviction_keeps_indexes_absolute() {
        let log = LogSink::new(2);
        log.info("a");
        log.info("b");
        log.info("c");

        assert_eq!(log.len(), 3);
        let page = log.read_from(0);
        assert_eq!(page.lines.len(), 2);
        assert!(page.lines[0].ends_with("b"));
        assert_eq!(page.next, 3);

        let page = log.read_from(2);
        assert_eq!(page.lines.len(), 1);
        assert!(page.lines[0].ends_with("c"));
    }

    #[test]
    fn index_past_end_returns_nothing() {
        let log = LogSink::new(4);
        log.info("a");
        let page = log.read_from(10);
        assert!(page.lines.is_empty());
        assert_eq!(page.next, 1);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let log = LogSink::new(1000);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.info(format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.read_from(0).lines.len(), 200);
    }
}
