//! Error types for stomp-client.

use thiserror::Error;

use crate::protocol::ParseError;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum StompError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading an events file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A received frame could not be parsed. The frame is discarded.
    #[error("Frame parse error: {0}")]
    Parse(#[from] ParseError),

    /// The transport failed while sending or receiving.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An operation needed an open transport.
    #[error("Transport is not connected")]
    NotConnected,

    /// A single frame exceeded the configured size limit.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// The operation requires a logged-in session.
    #[error("Not logged in")]
    NotLoggedIn,

    /// `connect` was called on a logged-in session.
    #[error("The client is already logged in, log out before trying again")]
    AlreadyLoggedIn,

    /// A RECEIPT frame had a missing or non-numeric `receipt-id` header.
    #[error("Malformed receipt: {0}")]
    MalformedReceipt(String),

    /// A MESSAGE body did not describe a valid event.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

impl StompError {
    /// Whether this error means the transport can no longer be used.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            StompError::Io(_)
                | StompError::Transport(_)
                | StompError::ConnectionClosed
                | StompError::NotConnected
                | StompError::FrameTooLarge { .. }
        )
    }
}

/// Result type alias using StompError.
pub type Result<T> = std::result::Result<T, StompError>;
