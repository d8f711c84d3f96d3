//! Wire format constants.
//!
//! A frame on the wire looks like:
//! ```text
//! COMMAND\n
//! name:value\n      (zero or more header lines)
//! \n
//! body\0
//! ```
//!
//! Only the STOMP 1.2 subset this client speaks is listed here.

/// Frame terminator byte.
pub const FRAME_TERMINATOR: u8 = 0x00;

/// The only protocol version offered in CONNECT.
pub const ACCEPT_VERSION: &str = "1.2";

/// Receipt id carried by DISCONNECT; its RECEIPT ends the session.
pub const DISCONNECT_RECEIPT_ID: i64 = -1;

/// Default maximum size of a single inbound frame (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame command names.
pub mod commands {
    /// Client → server: open a session.
    pub const CONNECT: &str = "CONNECT";
    /// Client → server: join a destination.
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    /// Client → server: leave a destination.
    pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
    /// Client → server: publish to a destination.
    pub const SEND: &str = "SEND";
    /// Client → server: close the session.
    pub const DISCONNECT: &str = "DISCONNECT";

    /// Server → client: login accepted.
    pub const CONNECTED: &str = "CONNECTED";
    /// Server → client: acknowledgment of a `receipt` header.
    pub const RECEIPT: &str = "RECEIPT";
    /// Server → client: a message published on a subscribed destination.
    pub const MESSAGE: &str = "MESSAGE";
    /// Server → client: the server rejected something and closes the session.
    pub const ERROR: &str = "ERROR";
}

/// Header names.
pub mod headers {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const HOST: &str = "host";
    pub const LOGIN: &str = "login";
    pub const PASSCODE: &str = "passcode";
    pub const DESTINATION: &str = "destination";
    pub const ID: &str = "id";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const MESSAGE: &str = "message";
    pub const SUBSCRIPTION: &str = "subscription";
}

/// Check whether a byte is an end-of-line byte allowed between frames.
#[inline]
pub fn is_eol(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}
