//! Error types for expectline.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for expectline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (spawn, PTY I/O)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session operation errors (expect, command execution)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Interface fact extraction errors
    #[error("Interface error: {0}")]
    Iface(#[from] IfaceError),
}

/// Transport layer errors (child process spawn, PTY plumbing).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to spawn the child process
    #[error("Failed to spawn {command:?}: {message}")]
    Spawn { command: String, message: String },

    /// Transport was already closed
    #[error("Transport closed")]
    Closed,

    /// I/O error on the PTY
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session layer errors (pattern matching, command discipline).
#[derive(Error, Debug)]
pub enum SessionError {
    /// None of the expected patterns appeared in time.
    ///
    /// Carries the output buffered so far; the session's read position
    /// stays valid for subsequent calls.
    #[error("Pattern not found within {timeout:?}")]
    ExpectTimeout { timeout: Duration, buffer: String },

    /// A command did not complete before the prompt timeout.
    ///
    /// An interrupt has already been sent (best-effort) when this is raised.
    #[error("Command {command:?} did not complete within {timeout:?} - prompt was not seen")]
    CommandTimeout { command: String, timeout: Duration },

    /// End-of-stream observed while a non-terminal pattern was expected
    #[error("End of stream while expecting a pattern")]
    BrokenSession { buffer: String },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Interface fact extraction errors.
#[derive(Error, Debug)]
pub enum IfaceError {
    /// No IPv4 address in the most recent extraction attempt
    #[error("No IPv4 address found on interface '{iface}'")]
    NoIpv4Address { iface: String },

    /// No non-link-local IPv6 address in the most recent extraction attempt.
    ///
    /// A link-local-only interface is treated as lacking IPv6.
    #[error("No IPv6 address found on interface '{iface}'")]
    NoIpv6Address { iface: String },

    /// The hardware address read did not parse as a MAC
    #[error("Unparseable MAC address {text:?} on interface '{iface}'")]
    BadMacAddress { iface: String, text: String },
}

/// Result type alias using expectline's Error.
pub type Result<T> = std::result::Result<T, Error>;
