//! Frame struct, serialization and parsing.
//!
//! Represents a complete protocol frame: a command, a header block and a
//! text body. Serialization appends the NUL terminator; parsing tolerates it.
//!
//! # Example
//!
//! ```
//! use stomp_client::protocol::{Frame, commands};
//!
//! let frame = Frame::builder(commands::SEND)
//!     .header("destination", "sports")
//!     .body("goal!")
//!     .build()
//!     .unwrap();
//!
//! let bytes = frame.serialize();
//! assert_eq!(&bytes[..], b"SEND\ndestination:sports\n\ngoal!\0");
//!
//! let parsed = Frame::parse(&bytes).unwrap();
//! assert_eq!(parsed, frame);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::wire_format::FRAME_TERMINATOR;

/// Errors produced while building or parsing a single frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No command line, or the command line is blank.
    #[error("Empty frame received")]
    EmptyFrame,
    /// A frame was built with an empty command.
    #[error("Frame command must not be empty")]
    EmptyCommand,
    /// Frame bytes are not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,
}

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: String,
    headers: BTreeMap<String, String>,
    body: String,
}

impl Frame {
    /// Build a frame, rejecting an empty command.
    pub fn build(
        command: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: impl Into<String>,
    ) -> Result<Self, ParseError> {
        let command = command.into();
        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(Self {
            command,
            headers,
            body: body.into(),
        })
    }

    /// Start building a frame with the given command.
    pub fn builder(command: impl Into<String>) -> FrameBuilder {
        FrameBuilder {
            command: command.into(),
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }

    /// Get the command.
    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Get a header value by name.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Get all headers.
    #[inline]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Get the body text.
    #[inline]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check whether the frame has the given command.
    #[inline]
    pub fn is(&self, command: &str) -> bool {
        self.command == command
    }

    /// Serialize to wire bytes, terminator included.
    pub fn serialize(&self) -> Bytes {
        let mut buf = self.encode();
        buf.put_u8(FRAME_TERMINATOR);
        buf.freeze()
    }

    /// Serialize without the terminator, for transports that append it.
    pub fn serialize_unterminated(&self) -> Bytes {
        self.encode().freeze()
    }

    fn encode(&self) -> BytesMut {
        let capacity = self.command.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len() + 2)
                .sum::<usize>()
            + self.body.len()
            + 3;
        let mut buf = BytesMut::with_capacity(capacity);
        buf.put_slice(self.command.as_bytes());
        buf.put_u8(b'\n');
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_u8(b':');
            buf.put_slice(value.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.put_u8(b'\n');
        buf.put_slice(self.body.as_bytes());
        buf
    }

    /// Parse a frame from raw bytes.
    ///
    /// A single trailing terminator byte is removed if present. Header lines
    /// without a colon are skipped.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let raw = raw.strip_suffix(&[FRAME_TERMINATOR]).unwrap_or(raw);
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;

        let mut lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

        let command = match lines.next() {
            Some(line) if !line.trim().is_empty() => line.to_string(),
            _ => return Err(ParseError::EmptyFrame),
        };

        let mut headers = BTreeMap::new();
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.to_string(), value.to_string());
                }
                None => tracing::debug!("Skipping malformed header line: {:?}", line),
            }
        }

        let body = lines.collect::<Vec<_>>().join("\n");

        Ok(Self {
            command,
            headers,
            body,
        })
    }
}

impl fmt::Display for Frame {
    /// Human-readable form without the terminator, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.command)?;
        for (name, value) in &self.headers {
            writeln!(f, "{}:{}", name, value)?;
        }
        writeln!(f)?;
        f.write_str(&self.body)
    }
}

/// Fluent builder for [`Frame`].
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    command: String,
    headers: BTreeMap<String, String>,
    body: String,
}

impl FrameBuilder {
    /// Add or replace a header.
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.insert(name.into(), value.to_string());
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Finish the frame.
    pub fn build(self) -> Result<Frame, ParseError> {
        Frame::build(self.command, self.headers, self.body)
    }
}
