//! Transport module - the byte-stream seam under the protocol session.
//!
//! Provides:
//! - [`Transport`] - connect / send / receive / close primitives
//! - [`TcpTransport`] - tokio TCP implementation used by the binary
//! - [`MemoryTransport`] - channel-backed implementation driven by a [`MemoryPeer`]

mod memory;
mod tcp;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::Result;

pub use memory::{MemoryPeer, MemoryTransport};
pub use tcp::TcpTransport;

/// Boxed future returned by transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A reliable byte stream carrying terminator-delimited frames.
///
/// Sending and receiving must be usable concurrently from different tasks:
/// a receive blocked on the network must not hold up a send.
pub trait Transport: Send + Sync + 'static {
    /// Open the stream to `addr` (`host:port`). Opening an open transport is a no-op.
    fn connect<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Write `buf` followed by the `terminator` byte.
    fn send_bytes<'a>(&'a self, buf: &'a [u8], terminator: u8) -> BoxFuture<'a, Result<()>>;

    /// Wait for the next complete frame, returned without its terminator.
    fn receive_bytes(&self, terminator: u8) -> BoxFuture<'_, Result<Bytes>>;

    /// Release the stream. Closing a closed transport is a no-op.
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Whether the stream is currently open.
    fn is_open(&self) -> bool;
}
