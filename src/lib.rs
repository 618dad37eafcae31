//! # Swarm Courier
//!
//! A client library for an onion-routed, swarm-replicated store-and-forward
//! messaging network. Messages are padded, signed and sealed to the
//! recipient, wrapped in protobuf envelopes and stored on every node of the
//! recipient's swarm, where the recipient later retrieves them.
//!
//! ## Features
//!
//! - **Sealed Sender**: Ed25519 identities, X25519 sealed boxes, sender
//!   revealed only to the recipient
//! - **Swarm Routing**: recipients mapped to node swarms by key digest
//! - **Redirect Handling**: misdirected storage calls follow node redirects
//! - **Local Watermark**: retrieved messages recorded in memory or SQLite
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use swarm_courier::{Client, ClientConfig, HttpTransport, Identity, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new(Duration::from_secs(30))?;
//!     let mut client = Client::new(
//!         Identity::generate(),
//!         MemoryStore::new(),
//!         transport,
//!         ClientConfig::default(),
//!     );
//!
//!     client.update().await?;
//!     for message in client.fetch_new_messages().await? {
//!         println!("{}: {:?}", message.from, message.body);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`crypto`]: identities, padding and the sign-then-seal primitive
//! - [`transport`]: protobuf records and the layered envelope codec
//! - [`network`]: node addressing, swarm selection and storage RPCs
//! - [`storage`]: local message record and retrieval watermark
//! - [`client`]: the orchestrator tying them together
//! - [`utils`]: configuration and errors

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use client::{Client, ClientConfig};
pub use crypto::Identity;
pub use network::{HttpTransport, SeedNode, ServiceNode, SnodeTransport};
pub use storage::{MemoryStore, MessageStore, SqliteStore};
pub use transport::{OutgoingMessage, PlainMessage, RawMessage};
pub use utils::{CourierConfig, CourierError, Result};

/// Default configuration values
pub mod defaults {
    use crate::network::SeedNode;

    /// Seconds between node list refreshes
    pub const SNODE_REFRESH_INTERVAL_SECS: u64 = 120;

    /// Seconds before a storage RPC is abandoned
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Seconds nodes keep a stored message (14 days)
    pub const MESSAGE_TTL_SECS: u64 = 14 * 24 * 60 * 60;

    /// Upper bound on nodes asked per storage call
    pub const MAX_REDIRECTS: usize = 16;

    /// Base delay between poll cycles in seconds
    pub const POLL_DELAY_SECS: u64 = 5;

    /// Ceiling for the poll delay after repeated failures
    pub const MAX_POLL_DELAY_SECS: u64 = 300;

    /// Seed host queried when the node map is empty
    pub const SEED_HOST: &str = "public.loki.foundation";

    /// Port of [`SEED_HOST`]
    pub const SEED_PORT: u16 = 443;

    /// The built-in seed list
    pub fn seed_nodes() -> Vec<SeedNode> {
        vec![SeedNode::new(SEED_HOST, SEED_PORT)]
    }
}
