//! Interactive session types.
//!
//! A session is three opaque byte streams plus a control channel. The
//! streams are boxed trait objects so any transport (a websocket, a TCP
//! connection, an in-memory duplex) can sit on the caller's side. Control
//! messages travel over an mpsc channel and may arrive at any point while
//! the streams are flowing.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// Sending half of a session control channel.
pub type ControlSender = mpsc::Sender<ControlMessage>;

/// Receiving half of a session control channel, consumed by the driver.
pub type ControlReceiver = mpsc::Receiver<ControlMessage>;

/// Create a bounded control channel for one session.
pub fn control_channel(buffer: usize) -> (ControlSender, ControlReceiver) {
    mpsc::channel(buffer)
}

/// In-band command delivered to a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The caller's terminal changed size.
    Resize { width: u16, height: u16 },
    /// Deliver a signal (e.g. `SIGINT`, `TERM`) to the remote process.
    Signal { name: String },
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub width: u16,
    pub height: u16,
}

impl TerminalSize {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl fmt::Display for TerminalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The caller's side of a session's byte streams.
pub struct SessionStreams {
    /// Bytes written into the remote process.
    pub stdin: Box<dyn AsyncRead + Send + Unpin>,
    /// Remote process standard output.
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    /// Remote process standard error.
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl SessionStreams {
    pub fn new(
        stdin: impl AsyncRead + Send + Unpin + 'static,
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }
}

impl fmt::Debug for SessionStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStreams").finish_non_exhaustive()
    }
}

/// Resolve a signal name (`SIGINT`, `int`, `TERM`, ...) to its number.
pub fn signal_number(name: &str) -> Option<i32> {
    let upper = name.trim().to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    let number = match bare {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "KILL" => libc::SIGKILL,
        "USR1" => libc::SIGUSR1,
        "USR2" => libc::SIGUSR2,
        "TERM" => libc::SIGTERM,
        "CONT" => libc::SIGCONT,
        "STOP" => libc::SIGSTOP,
        "TSTP" => libc::SIGTSTP,
        "WINCH" => libc::SIGWINCH,
        _ => return None,
    };
    Some(number)
}
