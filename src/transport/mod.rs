//! PTY transport layer wrapping portable-pty.
//!
//! This module provides the low-level child process management,
//! handling spawn configuration, PTY setup, and byte-level I/O.

pub mod config;
mod pty;

pub use config::SpawnConfig;
pub use pty::PtyTransport;
