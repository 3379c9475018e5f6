//! # Expectline
//!
//! Async expect-style session driver for interactive device consoles.
//!
//! Expectline spawns a command behind a pseudo-terminal and drives it the
//! way a test engineer would: send a line, wait for patterns in the
//! streamed output under a timeout, and read the text in between. Device
//! drivers (switch CLIs, Wi-Fi clients, telnet consoles) are thin scripts
//! on top of this layer.
//!
//! ## Features
//!
//! - Child process + PTY transport via portable-pty
//! - Regex and literal expect with earliest-match-wins semantics
//! - Echo-then-prompt `check_output` discipline with interrupt recovery
//! - One-time sudo-style privilege handshake at session open
//! - Swappable log sinks (console, colorized, none)
//! - Lazily cached IPv4/IPv6/MAC interface facts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use expectline::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), expectline::Error> {
//!     let mut session = SessionBuilder::new("ssh")
//!         .args(["admin@192.168.1.1"])
//!         .name("router")
//!         .prompt(r"router[>#]")?
//!         .open()
//!         .await?;
//!
//!     let version = session.check_output("show version").await?;
//!     println!("{version}");
//!
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod iface;
pub mod session;
pub mod sink;
pub mod transport;

// Re-export main types for convenience
pub use error::{Error, IfaceError, SessionError, TransportError};
pub use iface::InterfaceInfo;
pub use session::{CredentialStore, ExpectMatch, Session, SessionBuilder, Traced, trace_enabled};
pub use sink::{ColorSink, LogSink, NullSink, WriterSink};
pub use transport::SpawnConfig;
