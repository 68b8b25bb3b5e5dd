//! Publishing sinks for encoded lines.
//!
//! The poller hands every line to a [`LineSink`] synchronously. Batching,
//! flushing, and transport belong to whatever sits behind the sink.

use statsd_common::{BridgeError, BridgeResult};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Accepts encoded lines from pollers.
///
/// Lines handed over by one `poll()` arrive in call order. A returned error
/// is surfaced to the poller's caller unchanged.
pub trait LineSink: Send + Sync {
    /// Accept one line.
    fn accept(&self, line: String) -> BridgeResult<()>;
}

/// Sink shared between every meter of a registry.
pub type SharedSink = Arc<dyn LineSink>;

impl<T: LineSink + ?Sized> LineSink for Arc<T> {
    fn accept(&self, line: String) -> BridgeResult<()> {
        (**self).accept(line)
    }
}

/// In-memory sink, optionally bounded.
///
/// A bounded buffer rejects lines once full until it is drained.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Mutex<Vec<String>>,
    capacity: Option<usize>,
}

impl LineBuffer {
    /// Create an unbounded buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer that holds at most `capacity` lines.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(Vec::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Number of buffered lines.
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered lines in arrival order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take every buffered line, leaving the buffer empty.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl LineSink for LineBuffer {
    fn accept(&self, line: String) -> BridgeResult<()> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.capacity {
            if lines.len() >= capacity {
                return Err(BridgeError::Sink(format!(
                    "line buffer full ({capacity} lines)"
                )));
            }
        }
        lines.push(line);
        Ok(())
    }
}

/// Writes each line, newline-terminated, to an [`std::io::Write`].
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Flush the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the writer fails to flush.
    pub fn flush(&self) -> BridgeResult<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> LineSink for WriterSink<W> {
    fn accept(&self, line: String) -> BridgeResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        Ok(())
    }
}
