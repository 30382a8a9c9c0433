#![forbid(unsafe_code)]

//! Captured `tracing` output for diagnostic assertions.
//!
//! [`LogCapture`] is a [`MakeWriter`] that buffers each formatted event and
//! appends it as one line to a shared list when the per-event writer drops.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Shared sink of formatted log lines.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a subscriber that writes every event at or above
    /// `TRACE` into this capture.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        self.run_at(Level::TRACE, f)
    }

    /// Run `f` capturing events at or above `level`.
    pub fn run_at<R>(&self, level: Level, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(level)
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Captured lines so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Lines containing `needle`.
    #[must_use]
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }

    /// Lines at `level` containing `needle`.
    #[must_use]
    pub fn count_at(&self, level: Level, needle: &str) -> usize {
        let tag = level.as_str();
        self.lines()
            .iter()
            .filter(|line| line.contains(tag) && line.contains(needle))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            lines: Arc::clone(&self.lines),
            buf: Vec::with_capacity(128),
        }
    }
}

/// Per-event writer; flushes one line into the capture on drop.
pub struct CaptureWriter {
    lines: Arc<Mutex<Vec<String>>>,
    buf: Vec<u8>,
}

impl Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for CaptureWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf).trim_end().to_owned();
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_formatted_events() {
        let capture = LogCapture::new();
        capture.run(|| {
            tracing::warn!(index = 9, "snap ignored");
            tracing::debug!("quiet");
        });
        assert_eq!(capture.count_at(Level::WARN, "snap ignored"), 1);
        assert_eq!(capture.matching("quiet").len(), 1);
        assert!(capture.lines()[0].contains("index=9"));
    }

    #[test]
    fn level_filter_applies() {
        let capture = LogCapture::new();
        capture.run_at(Level::WARN, || tracing::info!("hidden"));
        assert!(capture.lines().is_empty());
    }
}
