//! Accumulation buffer with read-position discipline.
//!
//! Output read from the transport lands here after ANSI stripping. The
//! buffer holds only not-yet-consumed bytes: when an expect call matches,
//! everything up to the end of the match is split off, so a timed-out call
//! leaves the read position untouched for the next one.

use bytes::{Buf, BytesMut};

/// Buffer for accumulating cleaned output between expect matches.
#[derive(Debug, Default)]
pub struct PatternBuffer {
    /// Unconsumed output bytes.
    buffer: BytesMut,
}

impl PatternBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    ///
    /// Returns the number of cleaned bytes appended; the appended region is
    /// `as_slice()[len - appended..]` until the next consume.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let cleaned = strip_ansi_escapes::strip(data);
        self.buffer.extend_from_slice(&cleaned);
        cleaned.len()
    }

    /// Consume through `end`, returning the text before `start` and the
    /// matched text in `start..end`.
    ///
    /// Offsets are relative to the current unconsumed region.
    pub fn consume_match(&mut self, start: usize, end: usize) -> (String, String) {
        let before = self.buffer.split_to(start);
        let matched = self.buffer.split_to(end - start);
        (
            String::from_utf8_lossy(&before).into_owned(),
            String::from_utf8_lossy(&matched).into_owned(),
        )
    }

    /// Discard everything currently buffered.
    pub fn consume_all(&mut self) {
        self.buffer.advance(self.buffer.len());
    }

    /// Take ownership of the unconsumed contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer).to_vec()
    }

    /// Unconsumed contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Unconsumed contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Current unconsumed length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
