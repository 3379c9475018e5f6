//! Interactive session with expect-style pattern waits.

use std::io;
use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::Instant;

use crate::channel::{Located, PatternBuffer, earliest_literal, earliest_match};
use crate::error::{Result, SessionError, TransportError};
use crate::sink::LogSink;
use crate::transport::PtyTransport;

/// How long to wait for a command's own echo in `check_output`.
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a successful expect call.
#[derive(Debug, Clone)]
pub struct ExpectMatch {
    /// Index of the pattern that matched in the caller's list.
    pub index: usize,

    /// Output between the previous read position and the match.
    pub before: String,

    /// The matched text itself.
    pub matched: String,
}

/// Outcome of a bounded wait, before being mapped to errors.
///
/// The privilege handshake treats `Timeout` and `Eof` as "no password
/// required"; public expect calls turn them into errors.
pub(crate) enum Wait {
    Match(ExpectMatch),
    Timeout,
    Eof,
}

/// What a wait is looking for.
pub(crate) enum Needles<'a> {
    Regex(&'a [Regex]),
    Literal(&'a [&'a str]),
}

/// An interactive command session over a spawned child process.
///
/// Owns the transport, the accumulated output buffer, the prompt pattern
/// set, and the installed log sink. One logical caller at a time; every
/// wait is bounded by an explicit or defaulted timeout.
pub struct Session {
    /// Fixed identity given at construction.
    name: String,

    transport: PtyTransport,
    buffer: PatternBuffer,

    /// Patterns recognized as marking the end of a command's output.
    prompt: Vec<Regex>,

    /// Default timeout for expect and check_output.
    timeout: Duration,

    /// Line separator appended by `sendline`.
    linesep: String,

    /// Destination for every chunk read from the transport.
    sink: Box<dyn LogSink>,

    /// End-of-stream observed on the transport.
    eof: bool,
}

impl Session {
    pub(crate) fn new(
        name: String,
        transport: PtyTransport,
        prompt: Vec<Regex>,
        timeout: Duration,
        linesep: String,
        sink: Box<dyn LogSink>,
    ) -> Self {
        Self {
            name,
            transport,
            buffer: PatternBuffer::new(),
            prompt,
            timeout,
            linesep,
            sink,
            eof: false,
        }
    }

    /// The session's name, fixed at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the default timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Replace the prompt pattern set.
    pub fn set_prompt(&mut self, prompt: Vec<Regex>) {
        self.prompt = prompt;
    }

    /// The current prompt pattern set.
    pub fn prompt(&self) -> &[Regex] {
        &self.prompt
    }

    /// Install a new log sink.
    ///
    /// Bytes already forwarded stay with the previous destination; only
    /// future reads go to the new one.
    pub fn set_sink(&mut self, sink: Box<dyn LogSink>) {
        self.sink.flush();
        self.sink = sink;
    }

    /// Write raw bytes to the child.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        trace!("{}: send {} bytes", self.name, bytes.len());
        self.transport.write_all(bytes)
    }

    /// Write a line terminated by the session's line separator.
    pub fn sendline(&mut self, text: &str) -> Result<usize> {
        let line = format!("{}{}", text, self.linesep);
        self.send(line.as_bytes())
    }

    /// Send a control character (e.g. `'c'` for an interrupt).
    pub fn sendcontrol(&mut self, c: char) -> Result<usize> {
        let byte = control_byte(c).ok_or_else(|| {
            TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no control mapping for {c:?}"),
            ))
        })?;
        self.send(&[byte])
    }

    /// Wait until one of the ordered patterns matches the accumulated
    /// output, using the default timeout.
    pub async fn expect(&mut self, patterns: &[Regex]) -> Result<ExpectMatch> {
        self.expect_timeout(patterns, self.timeout).await
    }

    /// Wait until one of the ordered patterns matches, with an explicit
    /// timeout.
    ///
    /// On timeout the error carries the output buffered so far and the
    /// read position stays valid for subsequent calls.
    pub async fn expect_timeout(
        &mut self,
        patterns: &[Regex],
        timeout: Duration,
    ) -> Result<ExpectMatch> {
        let wait = self.wait_for(Needles::Regex(patterns), timeout).await;
        self.finish_expect(wait, timeout)
    }

    /// Literal-text variant of [`expect`](Self::expect); no pattern syntax.
    pub async fn expect_exact(&mut self, needles: &[&str]) -> Result<ExpectMatch> {
        self.expect_exact_timeout(needles, self.timeout).await
    }

    /// Literal-text variant of [`expect_timeout`](Self::expect_timeout).
    pub async fn expect_exact_timeout(
        &mut self,
        needles: &[&str],
        timeout: Duration,
    ) -> Result<ExpectMatch> {
        let wait = self.wait_for(Needles::Literal(needles), timeout).await;
        self.finish_expect(wait, timeout)
    }

    /// Wait for the session's prompt using the default timeout.
    pub async fn expect_prompt(&mut self) -> Result<ExpectMatch> {
        self.expect_prompt_timeout(self.timeout).await
    }

    /// Wait for the session's prompt with an explicit timeout.
    pub async fn expect_prompt_timeout(&mut self, timeout: Duration) -> Result<ExpectMatch> {
        let prompt = self.prompt.clone();
        self.expect_timeout(&prompt, timeout).await
    }

    /// Send a command and return the trimmed output between its echo and
    /// the next prompt, using the default timeout.
    pub async fn check_output(&mut self, command: &str) -> Result<String> {
        self.check_output_timeout(command, self.timeout).await
    }

    /// Send a command and return the trimmed output between its echo and
    /// the next prompt.
    ///
    /// If the prompt does not reappear in time, a best-effort interrupt is
    /// sent so the remote shell stays responsive, then
    /// [`SessionError::CommandTimeout`] is raised.
    pub async fn check_output_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        self.sendline(command)?;
        self.expect_exact_timeout(&[command], ECHO_TIMEOUT).await?;

        let prompt = self.prompt.clone();
        match self.wait_for(Needles::Regex(&prompt), timeout).await {
            Wait::Match(m) => Ok(m.before.trim().to_string()),
            Wait::Timeout => {
                debug!("{}: prompt not seen after {:?}, interrupting", self.name, timeout);
                let _ = self.sendcontrol('c');
                Err(SessionError::CommandTimeout {
                    command: command.to_string(),
                    timeout,
                }
                .into())
            }
            Wait::Eof => Err(self.broken()),
        }
    }

    /// Read and discard output until the timeout elapses.
    ///
    /// Used as a trailing guard after short reads (e.g. the MAC fetch) to
    /// soak up leftover prompt noise; timeout and end-of-stream are both
    /// normal here.
    pub async fn drain(&mut self, timeout: Duration) {
        let _ = self.wait_for(Needles::Regex(&[]), timeout).await;
        self.buffer.consume_all();
    }

    /// Terminate the child and release transport resources. Idempotent.
    pub fn close(&mut self) {
        self.sink.flush();
        self.transport.close();
    }

    /// Whether close() has been called.
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Core bounded wait shared by expect calls and the privilege
    /// handshake.
    ///
    /// Checks the already-buffered output first, then keeps pulling chunks
    /// until a match, the deadline, or end-of-stream. Every chunk read is
    /// forwarded to the installed sink.
    pub(crate) async fn wait_for(&mut self, needles: Needles<'_>, timeout: Duration) -> Wait {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(found) = self.try_find(&needles) {
                return Wait::Match(self.consume(found));
            }

            if self.eof {
                return Wait::Eof;
            }

            match tokio::time::timeout_at(deadline, self.transport.recv_chunk()).await {
                Ok(Some(chunk)) => self.ingest(&chunk),
                Ok(None) => {
                    self.eof = true;
                    // Loop once more: the closing chunk may already hold a
                    // match in the buffer.
                }
                Err(_) => return Wait::Timeout,
            }
        }
    }

    /// Append a chunk to the buffer and forward the cleaned text to the
    /// sink.
    fn ingest(&mut self, chunk: &[u8]) {
        let appended = self.buffer.extend(chunk);
        if appended == 0 {
            return;
        }
        let start = self.buffer.len() - appended;
        let text = String::from_utf8_lossy(&self.buffer.as_slice()[start..]).into_owned();
        self.sink.write(&text);
        self.sink.flush();
    }

    fn try_find(&self, needles: &Needles<'_>) -> Option<Located> {
        let haystack = self.buffer.as_slice();
        match needles {
            Needles::Regex(patterns) => earliest_match(patterns, haystack),
            Needles::Literal(literals) => earliest_literal(literals, haystack),
        }
    }

    fn consume(&mut self, found: Located) -> ExpectMatch {
        let (before, matched) = self.buffer.consume_match(found.start, found.end);
        ExpectMatch {
            index: found.index,
            before,
            matched,
        }
    }

    fn finish_expect(&mut self, wait: Wait, timeout: Duration) -> Result<ExpectMatch> {
        match wait {
            Wait::Match(m) => Ok(m),
            Wait::Timeout => Err(SessionError::ExpectTimeout {
                timeout,
                buffer: self.buffer.as_str_lossy().into_owned(),
            }
            .into()),
            Wait::Eof => Err(self.broken()),
        }
    }

    fn broken(&self) -> crate::error::Error {
        SessionError::BrokenSession {
            buffer: self.buffer.as_str_lossy().into_owned(),
        }
        .into()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map a character to its control byte (`'c'` -> 0x03).
fn control_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        '@' => Some(0),
        '[' => Some(27),
        '\\' => Some(28),
        ']' => Some(29),
        '^' => Some(30),
        '_' => Some(31),
        '?' => Some(127),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_byte_mapping() {
        assert_eq!(control_byte('c'), Some(0x03));
        assert_eq!(control_byte('C'), Some(0x03));
        assert_eq!(control_byte('d'), Some(0x04));
        assert_eq!(control_byte(']'), Some(29));
        assert_eq!(control_byte('1'), None);
    }
}
