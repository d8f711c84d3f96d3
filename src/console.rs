//! Console output.
//!
//! Every user-visible message is a [`Notice`]. The client sends notices over
//! a channel; the binary prints them to stdout one per line.
//!
//! # Important
//!
//! - **stdout**: notices only
//! - **stderr**: logs
//! - **Never use `println!`**: It may add `\r\n` on Windows

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use tokio::sync::mpsc;

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// CONNECTED was received.
    LoginSuccessful,
    /// Pending-action text released by a RECEIPT.
    Receipt(String),
    /// `login` while logged in.
    AlreadyLoggedIn,
    /// `join` on a channel with a live subscription.
    AlreadyJoined(String),
    /// The transport could not be opened or CONNECT could not be sent.
    ConnectFailed,
    /// The server sent ERROR.
    ServerError { message: String, body: String },
    /// The transport failed while logged in.
    ConnectionLost,
    /// A RECEIPT without a usable `receipt-id`.
    MalformedReceipt(String),
    /// The summary file could not be written.
    FileError(PathBuf),
    /// The report file could not be loaded.
    ReportFailed { path: PathBuf, reason: String },
    /// A command was sent while the connection could not carry it.
    SendFailed(&'static str),
    /// A command had the wrong arguments.
    Usage(&'static str),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LoginSuccessful => f.write_str("Login successful"),
            Notice::Receipt(text) => f.write_str(text),
            Notice::AlreadyLoggedIn => {
                f.write_str("The client is already logged in, log out before trying again")
            }
            Notice::AlreadyJoined(channel) => write!(f, "Already joined channel {}", channel),
            Notice::ConnectFailed => f.write_str("Could not connect to the server"),
            Notice::ServerError { message, body } => {
                write!(f, "Server error: {}", message)?;
                let body = body.trim_end();
                if !body.is_empty() {
                    write!(f, "\n{}", body)?;
                }
                Ok(())
            }
            Notice::ConnectionLost => f.write_str("Connection to the server was lost"),
            Notice::MalformedReceipt(detail) => {
                write!(f, "Malformed receipt from server: {}", detail)
            }
            Notice::FileError(path) => {
                write!(f, "Error: Could not open file {}", path.display())
            }
            Notice::ReportFailed { path, reason } => {
                write!(f, "Could not read report file {}: {}", path.display(), reason)
            }
            Notice::SendFailed(command) => write!(f, "Could not send {} to the server", command),
            Notice::Usage(usage) => write!(f, "Usage: {}", usage),
        }
    }
}

/// Write a line to stdout.
///
/// Writes the string followed by a single `\n` and flushes.
///
/// # Errors
///
/// Returns IO error if write or flush fails.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

/// Print notices until every sender is gone.
pub async fn print_notices(mut notices: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        if let Err(e) = write_stdout_line(&notice.to_string()) {
            tracing::warn!("Failed to write notice to stdout: {}", e);
        }
    }
}
