//! PTY transport implementation using portable-pty.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::trace;
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::SpawnConfig;
use crate::error::{Result, TransportError};

/// Transport over a child process spawned behind a pseudo-terminal.
///
/// A blocking reader task pumps PTY output into an mpsc channel so the
/// session layer can race reads against timeouts. Writes go straight to
/// the PTY master; the session is single-caller, so no writer task is
/// needed.
pub struct PtyTransport {
    /// Write half of the PTY master.
    writer: Box<dyn Write + Send>,

    /// Output chunks from the reader task. Channel closure is end-of-stream.
    output_rx: mpsc::Receiver<Vec<u8>>,

    /// Kill handle for the child process.
    killer: Box<dyn portable_pty::ChildKiller + Send + Sync>,

    /// Reader task handle, aborted on drop.
    reader_handle: Option<JoinHandle<()>>,

    /// Reaper task handle, aborted on drop.
    wait_handle: Option<JoinHandle<()>>,

    /// Whether close() has already run.
    closed: bool,
}

impl PtyTransport {
    /// Spawn the configured command on a fresh PTY.
    ///
    /// Must be called from within a tokio runtime; the PTY reader runs on
    /// the blocking pool.
    pub fn spawn(config: &SpawnConfig) -> Result<Self> {
        let spawn_err = |message: String| TransportError::Spawn {
            command: config.command_line(),
            message,
        };

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.terminal_height,
                cols: config.terminal_width,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_err(e.to_string()))?;

        let mut builder = CommandBuilder::new(&config.command);
        for arg in &config.args {
            builder.arg(arg);
        }
        for (key, value) in &config.env {
            builder.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| spawn_err(e.to_string()))?;
        let killer = child.clone_killer();

        // The slave end must drop so reads hit EOF when the child exits.
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err(e.to_string()))?;

        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(128);
        let reader_handle: JoinHandle<()> = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 8_192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        trace!("pty read: {} bytes", n);
                        if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(5));
                        continue;
                    }
                    Err(_) => break,
                }
            }
            // Dropping output_tx closes the channel, which the session
            // layer observes as end-of-stream.
        });

        // Reap the child so it never lingers as a zombie.
        let wait_handle: JoinHandle<()> = tokio::task::spawn_blocking(move || {
            let _ = child.wait();
        });

        Ok(Self {
            writer,
            output_rx,
            killer,
            reader_handle: Some(reader_handle),
            wait_handle: Some(wait_handle),
            closed: false,
        })
    }

    /// Write raw bytes to the child and flush.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(TransportError::Closed.into());
        }
        self.writer.write_all(bytes).map_err(TransportError::Io)?;
        self.writer.flush().map_err(TransportError::Io)?;
        Ok(bytes.len())
    }

    /// Receive the next chunk of output, or `None` on end-of-stream.
    pub async fn recv_chunk(&mut self) -> Option<Vec<u8>> {
        self.output_rx.recv().await
    }

    /// Terminate the child and release PTY resources. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.killer.kill();
    }

    /// Whether close() has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for PtyTransport {
    fn drop(&mut self) {
        self.close();
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.wait_handle.take() {
            handle.abort();
        }
    }
}
