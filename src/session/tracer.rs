//! Debug tracing wrapper attributing session calls to their caller.
//!
//! A [`Traced`] view delegates to the underlying session without altering
//! return values or introducing new failure modes. When the process-wide
//! debug switch is set, each call is logged against the context label the
//! caller supplied, in the form `"<context> = sending: ..."`.

use std::sync::OnceLock;
use std::time::Duration;

use log::debug;
use regex::bytes::Regex;

use super::expect::{ExpectMatch, Session};
use crate::error::Result;

/// Environment variable enabling trace output, read once per process.
const DEBUG_ENV: &str = "EXPECTLINE_DEBUG";

const TRACE_TARGET: &str = "expectline::trace";

/// Whether the process-wide debug switch is set.
pub fn trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os(DEBUG_ENV).is_some())
}

/// A session view that logs each call under a caller-supplied context.
///
/// With the debug switch off, behavior is byte-identical to calling the
/// session directly.
pub struct Traced<'a> {
    session: &'a mut Session,
    context: &'static str,
}

impl Session {
    /// Wrap the session with a tracing context label, typically
    /// `"module::function"` of the invoking driver code.
    pub fn traced(&mut self, context: &'static str) -> Traced<'_> {
        Traced {
            session: self,
            context,
        }
    }
}

impl Traced<'_> {
    /// See [`Session::send`].
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        if trace_enabled() {
            debug!(
                target: TRACE_TARGET,
                "{} = sending: {:?}",
                self.context,
                String::from_utf8_lossy(bytes)
            );
        }
        self.session.send(bytes)
    }

    /// See [`Session::sendline`].
    pub fn sendline(&mut self, text: &str) -> Result<usize> {
        if trace_enabled() {
            debug!(target: TRACE_TARGET, "{} = sending: {:?}", self.context, text);
        }
        self.session.sendline(text)
    }

    /// See [`Session::sendcontrol`].
    pub fn sendcontrol(&mut self, c: char) -> Result<usize> {
        if trace_enabled() {
            debug!(target: TRACE_TARGET, "{} = sending: control-{:?}", self.context, c);
        }
        self.session.sendcontrol(c)
    }

    /// See [`Session::expect`].
    pub async fn expect(&mut self, patterns: &[Regex]) -> Result<ExpectMatch> {
        self.log_expecting(patterns);
        let result = self.session.expect(patterns).await;
        self.log_outcome(&result);
        result
    }

    /// See [`Session::expect_timeout`].
    pub async fn expect_timeout(
        &mut self,
        patterns: &[Regex],
        timeout: Duration,
    ) -> Result<ExpectMatch> {
        self.log_expecting(patterns);
        let result = self.session.expect_timeout(patterns, timeout).await;
        self.log_outcome(&result);
        result
    }

    /// See [`Session::expect_exact`].
    pub async fn expect_exact(&mut self, needles: &[&str]) -> Result<ExpectMatch> {
        if trace_enabled() {
            debug!(target: TRACE_TARGET, "{} = expecting: {:?}", self.context, needles);
        }
        let result = self.session.expect_exact(needles).await;
        self.log_outcome(&result);
        result
    }

    /// See [`Session::expect_prompt`].
    pub async fn expect_prompt(&mut self) -> Result<ExpectMatch> {
        if trace_enabled() {
            debug!(target: TRACE_TARGET, "{} = expecting: prompt", self.context);
        }
        let result = self.session.expect_prompt().await;
        self.log_outcome(&result);
        result
    }

    /// Direct access to the wrapped session.
    pub fn session(&mut self) -> &mut Session {
        self.session
    }

    fn log_expecting(&self, patterns: &[Regex]) {
        if trace_enabled() {
            let shown: Vec<&str> = patterns.iter().map(|p| p.as_str()).collect();
            debug!(target: TRACE_TARGET, "{} = expecting: {:?}", self.context, shown);
        }
    }

    fn log_outcome(&self, result: &Result<ExpectMatch>) {
        if !trace_enabled() {
            return;
        }
        match result {
            Ok(m) => {
                debug!(target: TRACE_TARGET, "{} = matched: {:?}", self.context, m.matched)
            }
            Err(_) => debug!(target: TRACE_TARGET, "{} = expired", self.context),
        }
    }
}
