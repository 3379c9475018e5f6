//! Session layer: spawn, expect, trace, and credential handling.
//!
//! The session layer provides the main API for driving an interactive
//! child process: pattern waits under timeouts, the echo-then-prompt
//! command discipline, and the one-time privilege handshake at open.

mod builder;
mod credential;
mod expect;
mod tracer;

pub use builder::SessionBuilder;
pub use credential::CredentialStore;
pub use expect::{ExpectMatch, Session};
pub use tracer::{Traced, trace_enabled};
