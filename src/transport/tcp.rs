//! TCP transport.
//!
//! The stream is split into independently locked halves so the inbound loop
//! can sit in `receive_bytes` while the command loop sends.
//!
//! # Example
//!
//! ```ignore
//! use stomp_client::transport::{TcpTransport, Transport};
//!
//! let transport = TcpTransport::new();
//! transport.connect("127.0.0.1:7777").await?;
//! transport.send_bytes(b"CONNECT\naccept-version:1.2\n\n", 0).await?;
//! let frame = transport.receive_bytes(0).await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::{BoxFuture, Transport};
use crate::error::{Result, StompError};
use crate::protocol::{FrameBuffer, DEFAULT_MAX_FRAME_SIZE};

/// Size of a single socket read.
const READ_CHUNK_SIZE: usize = 4096;

/// Read half plus the frames buffered from it.
struct ReadState {
    half: OwnedReadHalf,
    frames: FrameBuffer,
}

/// TCP transport backed by a tokio `TcpStream`.
pub struct TcpTransport {
    reader: Mutex<Option<ReadState>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    open: AtomicBool,
    max_frame_size: usize,
}

impl TcpTransport {
    /// Create a closed transport with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a closed transport with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            open: AtomicBool::new(false),
            max_frame_size,
        }
    }

    async fn open_stream(&self, addr: &str) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        *self.reader.lock().await = Some(ReadState {
            half: read_half,
            frames: FrameBuffer::with_max_frame_size(self.max_frame_size),
        });
        *self.writer.lock().await = Some(write_half);
        self.open.store(true, Ordering::Release);

        tracing::info!("Connected to {}", addr);
        Ok(())
    }

    async fn write_frame(&self, buf: &[u8], terminator: u8) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(StompError::NotConnected)?;

        let mut wire = Vec::with_capacity(buf.len() + 1);
        wire.extend_from_slice(buf);
        wire.push(terminator);

        writer.write_all(&wire).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn read_frame(&self, terminator: u8) -> Result<Bytes> {
        let mut guard = self.reader.lock().await;
        let state = guard.as_mut().ok_or(StompError::NotConnected)?;
        state.frames.set_terminator(terminator);

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = state.frames.next_frame()? {
                return Ok(frame);
            }

            let n = state.half.read(&mut chunk).await?;
            if n == 0 {
                return Err(StompError::ConnectionClosed);
            }
            state.frames.extend(&chunk[..n]);
        }
    }

    async fn shutdown(&self) {
        let was_open = self.open.swap(false, Ordering::AcqRel);

        // Shutting the write side down first makes the peer close, which
        // unblocks a receive still holding the read half.
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Error shutting down write half: {}", e);
            }
        }
        self.reader.lock().await.take();

        if was_open {
            tracing::info!("Connection closed");
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn connect<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.open_stream(addr))
    }

    fn send_bytes<'a>(&'a self, buf: &'a [u8], terminator: u8) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.write_frame(buf, terminator))
    }

    fn receive_bytes(&self, terminator: u8) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(self.read_frame(terminator))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
