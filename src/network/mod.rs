//! Storage network access.
//!
//! This module provides storage-node descriptors and addressing, the mapping
//! from identities to swarms, the cached node map, the JSON-RPC transport and
//! the typed store/retrieve/node-list calls built on it.

pub mod node_client;
pub mod rpc;
pub mod service_node;
pub mod snode_map;
pub mod swarm;

#[cfg(test)]
pub(crate) mod mock;

pub use node_client::SnodeClient;
pub use rpc::{Endpoint, HttpTransport, SnodeTransport, StorageResponse};
pub use service_node::{SeedNode, ServiceNode, INVALID_SWARM_ID};
pub use snode_map::SwarmMap;
pub use swarm::{closest_swarm_id, pubkey_digest, select_swarm};
