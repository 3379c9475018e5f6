//! Swappable destinations for console traffic.
//!
//! Every chunk read from the transport is forwarded to the session's
//! installed [`LogSink`]. Sinks are swappable between calls: installing a
//! new one only changes where future reads go, and installing [`NullSink`]
//! silences forwarding while reads continue internally.

use std::io::{self, Write};

use owo_colors::{OwoColorize, Style};

/// Capability interface for a log destination.
pub trait LogSink: Send {
    /// Forward a chunk of text to the destination.
    fn write(&mut self, text: &str);

    /// Flush the destination.
    fn flush(&mut self);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&mut self, _text: &str) {}

    fn flush(&mut self) {}
}

/// Sink forwarding to any [`io::Write`] destination.
///
/// Write errors are swallowed; a broken console must never fail the
/// session that is being observed.
pub struct WriterSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer as a sink.
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl WriterSink<io::Stdout> {
    /// Sink forwarding to the process stdout.
    pub fn console() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

/// Sink applying a fixed style to every chunk before forwarding.
///
/// Chunk boundaries pass through unchanged; only the styling escape codes
/// are added around each chunk.
pub struct ColorSink {
    inner: Box<dyn LogSink>,
    style: Style,
}

impl ColorSink {
    /// Wrap an inner sink with a fixed style.
    pub fn new(inner: Box<dyn LogSink>, style: Style) -> Self {
        Self { inner, style }
    }
}

impl LogSink for ColorSink {
    fn write(&mut self, text: &str) {
        self.inner.write(&format!("{}", text.style(self.style)));
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}
