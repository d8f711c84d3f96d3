//! Protocol session - outbound frames and connection state.
//!
//! The session owns the only handle to the [`Transport`] and the connection
//! state word. Every outbound operation checks its precondition and reports
//! failure through `Result`; nothing here panics or retries.
//!
//! ```text
//! Disconnected ──connect()──► AwaitingConnected ──CONNECTED──► LoggedIn
//!      ▲                                                          │
//!      └──── ERROR / RECEIPT -1 / transport failure ──────────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::frame::Frame;
use super::wire_format::{commands, headers, ACCEPT_VERSION, DISCONNECT_RECEIPT_ID, FRAME_TERMINATOR};
use crate::error::{Result, StompError};
use crate::transport::Transport;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No session; the transport may or may not be open.
    Disconnected = 0,
    /// CONNECT was sent, waiting for CONNECTED.
    AwaitingConnected = 1,
    /// CONNECTED was received.
    LoggedIn = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::AwaitingConnected,
            2 => ConnectionState::LoggedIn,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::AwaitingConnected => "awaiting-connected",
            ConnectionState::LoggedIn => "logged-in",
        };
        f.write_str(name)
    }
}

/// Issues the fixed set of outbound frames and tracks connection state.
pub struct ProtocolSession {
    transport: Arc<dyn Transport>,
    state: AtomicU8,
}

impl ProtocolSession {
    /// Create a disconnected session over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
        }
    }

    /// Current connection state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Overwrite the connection state.
    pub fn set_state(&self, state: ConnectionState) {
        let previous = ConnectionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            tracing::debug!("Connection state {} -> {}", previous, state);
        }
    }

    /// Whether CONNECTED has been received for the current session.
    #[inline]
    pub fn is_logged_in(&self) -> bool {
        self.state() == ConnectionState::LoggedIn
    }

    /// Whether the underlying transport is open.
    #[inline]
    pub fn is_transport_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Open the transport if needed and send CONNECT.
    ///
    /// Success only means the frame was sent; the CONNECTED reply arrives
    /// later on the inbound loop.
    pub async fn connect(&self, addr: &str, host: &str, login: &str, passcode: &str) -> Result<()> {
        if self.is_logged_in() {
            return Err(StompError::AlreadyLoggedIn);
        }

        if !self.transport.is_open() {
            self.transport.connect(addr).await?;
        }

        let frame = Frame::builder(commands::CONNECT)
            .header(headers::ACCEPT_VERSION, ACCEPT_VERSION)
            .header(headers::HOST, host)
            .header(headers::LOGIN, login)
            .header(headers::PASSCODE, passcode)
            .build()?;
        self.send_frame(&frame).await?;

        self.set_state(ConnectionState::AwaitingConnected);
        Ok(())
    }

    /// Send SUBSCRIBE for `destination`.
    pub async fn subscribe(&self, destination: &str, subscription_id: u64, receipt_id: i64) -> Result<()> {
        self.require_logged_in()?;
        let frame = Frame::builder(commands::SUBSCRIBE)
            .header(headers::DESTINATION, destination)
            .header(headers::ID, subscription_id)
            .header(headers::RECEIPT, receipt_id)
            .build()?;
        self.send_frame(&frame).await
    }

    /// Send UNSUBSCRIBE for a subscription id.
    pub async fn unsubscribe(&self, subscription_id: u64, receipt_id: i64) -> Result<()> {
        self.require_logged_in()?;
        let frame = Frame::builder(commands::UNSUBSCRIBE)
            .header(headers::ID, subscription_id)
            .header(headers::RECEIPT, receipt_id)
            .build()?;
        self.send_frame(&frame).await
    }

    /// Publish `body` to `destination`.
    pub async fn send(&self, destination: &str, body: &str) -> Result<()> {
        self.require_logged_in()?;
        let frame = Frame::builder(commands::SEND)
            .header(headers::DESTINATION, destination)
            .body(body)
            .build()?;
        self.send_frame(&frame).await
    }

    /// Send DISCONNECT carrying the sentinel receipt id.
    ///
    /// The session stays logged in until the matching RECEIPT arrives.
    pub async fn disconnect(&self) -> Result<()> {
        self.require_logged_in()?;
        let frame = Frame::builder(commands::DISCONNECT)
            .header(headers::RECEIPT, DISCONNECT_RECEIPT_ID)
            .build()?;
        self.send_frame(&frame).await
    }

    /// Wait for the next frame from the server.
    ///
    /// # Errors
    ///
    /// - transport failures (`is_transport_failure()`): the session is unusable
    /// - `Parse`: this frame was malformed and has been discarded
    pub async fn receive_frame(&self) -> Result<Frame> {
        let raw = self.transport.receive_bytes(FRAME_TERMINATOR).await?;
        let frame = Frame::parse(&raw)?;
        tracing::debug!("Received {} frame", frame.command());
        Ok(frame)
    }

    /// Release the transport and mark the session disconnected. Idempotent.
    pub async fn close_transport(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.transport.close().await;
    }

    fn require_logged_in(&self) -> Result<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(StompError::NotLoggedIn)
        }
    }

    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        tracing::debug!("Sending {} frame", frame.command());
        let wire = frame.serialize_unterminated();
        self.transport.send_bytes(&wire, FRAME_TERMINATOR).await
    }
}
