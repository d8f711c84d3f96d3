//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for splitting a byte stream into frames:
//! - `BetweenFrames`: Skipping end-of-line bytes (heart-beats) before a frame
//! - `InFrame`: Inside a frame, scanning for the terminator byte
//!
//! # Example
//!
//! ```
//! use stomp_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(b"RECEIPT\nreceipt-").unwrap().is_empty());
//! let frames = buffer.push(b"id:0\n\n\0\nCONNECTED\n\n\0").unwrap();
//!
//! assert_eq!(frames.len(), 2);
//! assert_eq!(&frames[0][..], b"RECEIPT\nreceipt-id:0\n\n");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{is_eol, DEFAULT_MAX_FRAME_SIZE, FRAME_TERMINATOR};
use crate::error::{Result, StompError};

/// State machine for frame splitting.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Skipping EOL bytes that may separate frames.
    BetweenFrames,
    /// Inside a frame; `scanned` bytes are known not to be the terminator.
    InFrame { scanned: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Frames are returned without their terminator byte.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current splitting state.
    state: State,
    /// Terminator byte ending each frame.
    terminator: u8,
    /// Maximum allowed frame size.
    max_frame_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 8KB, max frame: 1MB, NUL terminator.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom max frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::BetweenFrames,
            terminator: FRAME_TERMINATOR,
            max_frame_size,
        }
    }

    /// Switch to a different terminator byte.
    ///
    /// Bytes already buffered are rescanned for the new terminator.
    pub fn set_terminator(&mut self, terminator: u8) {
        if self.terminator != terminator {
            self.terminator = terminator;
            if let State::InFrame { .. } = self.state {
                self.state = State::InFrame { scanned: 0 };
            }
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// If data is fragmented, partial data is buffered internally for the
    /// next push.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if a frame grows beyond the maximum size
    /// without a terminator.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffered bytes.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the frame exceeds the size limit
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::BetweenFrames => {
                    let skip = self.buffer.iter().take_while(|&&b| is_eol(b)).count();
                    let _ = self.buffer.split_to(skip);
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    self.state = State::InFrame { scanned: 0 };
                }

                State::InFrame { scanned } => {
                    let terminator = self.terminator;
                    let found = self.buffer[scanned..].iter().position(|&b| b == terminator);
                    match found {
                        Some(offset) => {
                            let end = scanned + offset;
                            if end > self.max_frame_size {
                                return Err(self.too_large(end));
                            }
                            let frame = self.buffer.split_to(end).freeze();
                            // Drop the terminator itself.
                            let _ = self.buffer.split_to(1);
                            self.state = State::BetweenFrames;
                            return Ok(Some(frame));
                        }
                        None => {
                            let len = self.buffer.len();
                            if len > self.max_frame_size {
                                return Err(self.too_large(len));
                            }
                            self.state = State::InFrame { scanned: len };
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    /// Append data to the buffer without extracting frames.
    ///
    /// Pair with [`next_frame`](Self::next_frame) to pull frames one at a time.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn too_large(&mut self, size: usize) -> StompError {
        let max = self.max_frame_size;
        self.clear();
        StompError::FrameTooLarge { size, max }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::BetweenFrames;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::BetweenFrames => "BetweenFrames",
            State::InFrame { .. } => "InFrame",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
