//! In-memory transport.
//!
//! A [`MemoryTransport`] is connected to a [`MemoryPeer`] through unbounded
//! channels. The peer plays the server: it pushes raw bytes or whole frames
//! to the client and reads back what the client sent. Dropping the peer makes
//! the next client receive fail, like a reset connection.
//!
//! # Example
//!
//! ```ignore
//! use stomp_client::protocol::{commands, Frame};
//! use stomp_client::transport::{MemoryTransport, Transport};
//!
//! let (transport, mut peer) = MemoryTransport::pair();
//! transport.connect("server:7777").await?;
//!
//! peer.send_frame(&Frame::builder(commands::CONNECTED).build()?);
//! let raw = transport.receive_bytes(0).await?;
//! assert_eq!(&raw[..], b"CONNECTED\n\n");
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use super::{BoxFuture, Transport};
use crate::error::{Result, StompError};
use crate::protocol::{Frame, FrameBuffer};

/// Connection bookkeeping shared by both ends.
#[derive(Debug, Default)]
struct Link {
    refuse: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

struct Inbound {
    rx: mpsc::UnboundedReceiver<Bytes>,
    frames: FrameBuffer,
}

/// Client side of an in-memory connection.
pub struct MemoryTransport {
    inbound: Mutex<Inbound>,
    outbound: mpsc::UnboundedSender<Bytes>,
    open: AtomicBool,
    link: Arc<Link>,
}

/// Server side of an in-memory connection.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<Bytes>,
    from_client: mpsc::UnboundedReceiver<Bytes>,
    link: Arc<Link>,
}

impl MemoryTransport {
    /// Create a closed transport and the peer that drives it.
    pub fn pair() -> (Self, MemoryPeer) {
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let link = Arc::new(Link::default());

        let transport = Self {
            inbound: Mutex::new(Inbound {
                rx: client_rx,
                frames: FrameBuffer::new(),
            }),
            outbound: client_tx,
            open: AtomicBool::new(false),
            link: link.clone(),
        };
        let peer = MemoryPeer {
            to_client,
            from_client,
            link,
        };
        (transport, peer)
    }

    async fn read_frame(&self, terminator: u8) -> Result<Bytes> {
        let mut inbound = self.inbound.lock().await;
        inbound.frames.set_terminator(terminator);

        loop {
            if !self.is_open() {
                return Err(StompError::NotConnected);
            }
            if let Some(frame) = inbound.frames.next_frame()? {
                return Ok(frame);
            }
            match inbound.rx.recv().await {
                Some(chunk) => inbound.frames.extend(&chunk),
                None => return Err(StompError::ConnectionClosed),
            }
        }
    }

    async fn reset(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.link.closes.fetch_add(1, Ordering::AcqRel);
        }
        // A receive parked on the channel keeps the lock; its buffer is
        // empty in that case.
        if let Ok(mut inbound) = self.inbound.try_lock() {
            inbound.frames.clear();
        }
    }
}

impl Transport for MemoryTransport {
    fn connect<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.is_open() {
                return Ok(());
            }
            if self.link.refuse.load(Ordering::Acquire) {
                return Err(StompError::Transport(format!("connection to {} refused", addr)));
            }
            self.link.connects.fetch_add(1, Ordering::AcqRel);
            self.open.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn send_bytes<'a>(&'a self, buf: &'a [u8], terminator: u8) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.is_open() {
                return Err(StompError::NotConnected);
            }
            let mut wire = Vec::with_capacity(buf.len() + 1);
            wire.extend_from_slice(buf);
            wire.push(terminator);
            self.outbound
                .send(Bytes::from(wire))
                .map_err(|_| StompError::ConnectionClosed)
        })
    }

    fn receive_bytes(&self, terminator: u8) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(self.read_frame(terminator))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.reset())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl MemoryPeer {
    /// Push raw bytes to the client.
    pub fn send_raw(&self, bytes: impl Into<Bytes>) {
        if self.to_client.send(bytes.into()).is_err() {
            tracing::debug!("Bytes dropped, client transport is gone");
        }
    }

    /// Push a serialized frame to the client.
    pub fn send_frame(&self, frame: &Frame) {
        self.send_raw(frame.serialize());
    }

    /// Wait for the next frame the client sent.
    ///
    /// Returns `None` once the client transport is dropped.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        let raw = self.from_client.recv().await?;
        Frame::parse(&raw).ok()
    }

    /// Take the next frame the client sent, if one is already queued.
    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        let raw = self.from_client.try_recv().ok()?;
        Frame::parse(&raw).ok()
    }

    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.refuse.store(refuse, Ordering::Release);
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.link.connects.load(Ordering::Acquire)
    }

    /// Number of times an open transport was closed.
    pub fn close_count(&self) -> usize {
        self.link.closes.load(Ordering::Acquire)
    }
}
