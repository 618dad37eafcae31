//! Storage-node descriptors and their network addresses.
//!
//! Nodes are reached through a pseudo-hostname derived from their Ed25519
//! identity key (z-base-32 plus `.snode`), resolved by the network's own
//! name system. Nodes without a known key, such as seed nodes, are reached by
//! their plain host name or IP.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Swarm id of a node whose swarm is not known (redirect candidates, seeds)
pub const INVALID_SWARM_ID: u64 = u64::MAX;

/// Path of the node-list JSON-RPC endpoint
pub const JSON_RPC_PATH: &str = "/json_rpc";

/// Path of the message storage endpoint
pub const STORAGE_RPC_PATH: &str = "/storage_rpc/v1";

/// Suffix of key-derived node host names
pub const SNODE_TLD: &str = ".snode";

const ZBASE32_ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// A storage node as reported by the node-list RPC
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceNode {
    /// Public IP or host name
    #[serde(rename = "public_ip")]
    pub remote_ip: String,
    /// HTTPS port of the storage server
    pub storage_port: u16,
    /// Hex Ed25519 identity key
    #[serde(rename = "pubkey_ed25519", default)]
    pub identity_key: String,
    /// Hex X25519 encryption key
    #[serde(rename = "pubkey_x25519", default)]
    pub encryption_key: String,
    /// Position of the node's swarm on the 64-bit ring
    #[serde(default = "invalid_swarm_id")]
    pub swarm_id: u64,
}

/// Bootstrap node from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedNode {
    /// Host name or IP
    pub host: String,
    /// HTTPS port
    pub port: u16,
}

fn invalid_swarm_id() -> u64 {
    INVALID_SWARM_ID
}

impl ServiceNode {
    /// Create a node with unknown keys and swarm
    pub fn new(remote_ip: impl Into<String>, storage_port: u16) -> Self {
        Self {
            remote_ip: remote_ip.into(),
            storage_port,
            identity_key: String::new(),
            encryption_key: String::new(),
            swarm_id: INVALID_SWARM_ID,
        }
    }

    /// Host this node is addressed by
    pub fn snode_addr(&self) -> String {
        if self.identity_key.is_empty() {
            return self.remote_ip.clone();
        }
        match hex::decode(&self.identity_key) {
            Ok(key) => format!("{}{}", zbase32_encode(&key), SNODE_TLD),
            Err(_) => self.remote_ip.clone(),
        }
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn host_port(&self) -> String {
        let addr = self.snode_addr();
        if addr.contains(':') {
            format!("[{}]:{}", addr, self.storage_port)
        } else {
            format!("{}:{}", addr, self.storage_port)
        }
    }

    /// HTTPS URL of `path` on this node
    pub fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.host_port(), path)
    }

    /// URL of the node-list RPC
    pub fn rpc_url(&self) -> String {
        self.url(JSON_RPC_PATH)
    }

    /// URL of the storage RPC
    pub fn storage_url(&self) -> String {
        self.url(STORAGE_RPC_PATH)
    }

    /// Stable key identifying this node in caches
    pub fn key(&self) -> String {
        if self.identity_key.is_empty() {
            self.host_port()
        } else {
            self.identity_key.clone()
        }
    }

    /// Whether this node reported a swarm
    pub fn has_swarm(&self) -> bool {
        self.swarm_id != INVALID_SWARM_ID
    }
}

impl fmt::Display for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host_port())
    }
}

impl SeedNode {
    /// Create a seed entry
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Descriptor used to query this seed
    pub fn to_service_node(&self) -> ServiceNode {
        ServiceNode::new(self.host.clone(), self.port)
    }
}

/// z-base-32 encoding, most significant bits first, no padding
pub fn zbase32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ZBASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        out.push(ZBASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}
