//! Builder for opening interactive sessions.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use regex::bytes::Regex;
use secrecy::ExposeSecret;

use super::credential::CredentialStore;
use super::expect::{Needles, Session, Wait};
use crate::channel::compile_prompt_pattern;
use crate::error::{Result, SessionError};
use crate::sink::{LogSink, NullSink};
use crate::transport::{PtyTransport, SpawnConfig};

/// Bounded wait for the password prompt after an escalating spawn.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for constructing and opening a [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// use expectline::SessionBuilder;
///
/// # async fn example() -> Result<(), expectline::Error> {
/// let mut session = SessionBuilder::new("telnet")
///     .arg("10.0.0.1")
///     .name("switch-console")
///     .prompt(r"switch[>#]")?
///     .open()
///     .await?;
///
/// let uptime = session.check_output("show uptime").await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    config: SpawnConfig,
    name: Option<String>,
    prompt: Vec<Regex>,
    linesep: String,
    sink: Option<Box<dyn LogSink>>,
    credentials: Option<Arc<CredentialStore>>,
}

impl SessionBuilder {
    /// Create a builder spawning the given program.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            config: SpawnConfig::new(command),
            name: None,
            prompt: Vec::new(),
            linesep: "\n".to_string(),
            sink: None,
            credentials: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    /// Set the session's name; defaults to the spawned command.
    ///
    /// The name is fixed once the session is created.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a prompt pattern; an end anchor is added if missing.
    pub fn prompt(mut self, pattern: &str) -> Result<Self> {
        let compiled = compile_prompt_pattern(pattern).map_err(SessionError::InvalidPattern)?;
        self.prompt.push(compiled);
        Ok(self)
    }

    /// Set the default timeout for session operations.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the line separator used by `sendline` (default `"\n"`).
    pub fn linesep(mut self, linesep: impl Into<String>) -> Self {
        self.linesep = linesep.into();
        self
    }

    /// Set the PTY dimensions.
    pub fn terminal_size(mut self, width: u16, height: u16) -> Self {
        self.config.terminal_width = width;
        self.config.terminal_height = height;
        self
    }

    /// Install the initial log sink; defaults to [`NullSink`].
    pub fn sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Inject the credential store used by the privilege handshake;
    /// defaults to the process-wide shared store.
    pub fn credentials(mut self, store: Arc<CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Spawn the child and run the one-time privilege handshake.
    pub async fn open(self) -> Result<Session> {
        let name = self
            .name
            .unwrap_or_else(|| self.config.command.clone());
        let wants_escalation = self.config.wants_escalation();

        let transport = PtyTransport::spawn(&self.config)?;
        let mut session = Session::new(
            name,
            transport,
            self.prompt,
            self.config.timeout,
            self.linesep,
            self.sink.unwrap_or_else(|| Box::new(NullSink)),
        );

        if wants_escalation {
            let store = self.credentials.unwrap_or_else(CredentialStore::shared);
            privilege_handshake(&mut session, &store).await?;
        }

        Ok(session)
    }
}

/// Race the password prompt against a short timeout and end-of-stream.
///
/// Only the prompt outcome sends a password; the other two mean the spawn
/// needed none and are not errors.
async fn privilege_handshake(session: &mut Session, store: &CredentialStore) -> Result<()> {
    debug!("{}: privilege handshake armed", session.name());

    let prompt =
        Regex::new(r"\[sudo\] password for [^:]*: ").map_err(SessionError::InvalidPattern)?;

    match session
        .wait_for(Needles::Regex(std::slice::from_ref(&prompt)), HANDSHAKE_TIMEOUT)
        .await
    {
        Wait::Match(m) => {
            let secret = store.get_or_prompt(&m.matched).expose_secret().to_string();
            session.sendline(&secret)?;
        }
        Wait::Timeout | Wait::Eof => {
            debug!("{}: no password prompt observed", session.name());
        }
    }

    Ok(())
}
