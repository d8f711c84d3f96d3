//! # stomp-client
//!
//! Client for a STOMP 1.2 publish/subscribe server.
//!
//! A single user logs in, joins and leaves channels, publishes event reports
//! to a channel, and writes per-user summaries of the events received.
//!
//! ## Architecture
//!
//! - **Frame model** (`protocol`): text frames terminated by a NUL byte
//! - **Protocol session** (`protocol`): outbound frames and connection state
//! - **Coordinator** ([`Client`]): inbound and command loops over shared tables
//! - **Ledger** (`ledger`): received events per channel and user, in time order
//!
//! ## Example
//!
//! ```ignore
//! use stomp_client::{console, Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, notices) = Client::builder().build();
//!     tokio::spawn(console::print_notices(notices));
//!     tokio::spawn({
//!         let client = client.clone();
//!         async move { client.run_inbound().await }
//!     });
//!
//!     client.dispatch_command("login 127.0.0.1:7777 alice secret").await;
//!     client.dispatch_command("join police").await;
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod console;
pub mod error;
pub mod event;
pub mod ledger;
pub mod protocol;
pub mod report;
pub mod transport;

mod client;

pub use client::{Client, ClientBuilder, ClientConfig};
pub use console::Notice;
pub use error::{Result, StompError};
pub use event::Event;
