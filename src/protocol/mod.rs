//! Protocol module - wire format, framing, frame types and the session.
//!
//! This module implements the STOMP 1.2 subset the client speaks:
//! - Text frames with a command, headers and a NUL-terminated body
//! - Frame buffer for splitting a byte stream into frames
//! - Protocol session issuing outbound frames and tracking connection state

mod frame;
mod frame_buffer;
mod session;
mod wire_format;

pub use frame::{Frame, FrameBuilder, ParseError};
pub use frame_buffer::FrameBuffer;
pub use session::{ConnectionState, ProtocolSession};
pub use wire_format::{
    commands, headers, is_eol, ACCEPT_VERSION, DEFAULT_MAX_FRAME_SIZE, DISCONNECT_RECEIPT_ID,
    FRAME_TERMINATOR,
};
