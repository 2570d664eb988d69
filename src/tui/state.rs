//! Log buffering and per-cell display state for the TUI.

use crate::types::Signal;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::MakeWriter;

/// How long a cell stays highlighted after its direction flips.
pub const FLIP_HIGHLIGHT: Duration = Duration::from_secs(15);

/// In-memory log buffer for the TUI.
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBuffer {
    /// Create a new log buffer with a fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Push a line into the buffer.
    pub fn push_line(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Get the most recent lines, up to limit.
    pub fn recent(&self, limit: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let start = lines.len().saturating_sub(limit);
        lines.iter().skip(start).cloned().collect()
    }
}

/// Writer that buffers log lines for the TUI.
pub struct LogWriter {
    buffer: Arc<LogBuffer>,
    line: Vec<u8>,
}

impl LogWriter {
    fn take_line(&mut self) {
        if !self.line.is_empty() {
            let line = String::from_utf8_lossy(&self.line).to_string();
            self.buffer.push_line(line);
            self.line.clear();
        }
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &b in buf {
            if b == b'\n' {
                self.take_line();
            } else {
                self.line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.take_line();
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.take_line();
    }
}

/// MakeWriter for tracing subscriber that writes into LogBuffer.
#[derive(Clone)]
pub struct LogMakeWriter {
    buffer: Arc<LogBuffer>,
}

impl LogMakeWriter {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

impl<'a> MakeWriter<'a> for LogMakeWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.buffer.clone(),
            line: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Shown {
    signal: Signal,
    highlight_until: Option<Instant>,
}

/// What a grid cell shows for a raw cached signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    /// Always `Up` or `Down`.
    pub signal: Signal,
    pub highlighted: bool,
}

/// Remembers the last direction drawn per cell.
///
/// A neutral reading keeps the previous direction (down for a fresh cell).
/// A flip between up and down stays highlighted for [`FLIP_HIGHLIGHT`].
#[derive(Debug, Default)]
pub struct SignalDisplay {
    shown: HashMap<(String, String), Shown>,
}

impl SignalDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, symbol: &str, timeframe: &str, raw: Signal, now: Instant) -> CellView {
        let key = (symbol.to_string(), timeframe.to_string());
        let previous = self.shown.get(&key).copied();

        let signal = match (raw, previous) {
            (Signal::Up | Signal::Down, _) => raw,
            (Signal::Neutral, Some(prev)) => prev.signal,
            (Signal::Neutral, None) => Signal::Down,
        };

        let highlight_until = match previous {
            Some(prev) if prev.signal != signal => Some(now + FLIP_HIGHLIGHT),
            Some(prev) => prev.highlight_until,
            None => None,
        };

        self.shown.insert(
            key,
            Shown {
                signal,
                highlight_until,
            },
        );

        CellView {
            signal,
            highlighted: highlight_until.is_some_and(|until| until > now),
        }
    }
}
