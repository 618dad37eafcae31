//! In-memory storage network for tests.
//!
//! Every node shares one replicated mailbox per recipient. A node answers
//! storage calls for recipients its swarm owns and redirects everything else
//! to the owning swarm. Replies can be scripted per node and method, and
//! nodes can be made unreachable.

use crate::crypto::identity;
use crate::network::rpc::{Endpoint, SnodeTransport};
use crate::network::service_node::ServiceNode;
use crate::network::swarm;
use crate::utils::{NetworkError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const FIRST_TIMESTAMP: u64 = 1_700_000_000_000;

/// A call the mock received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Key of the node called
    pub node: String,
    /// Endpoint called
    pub endpoint: Endpoint,
    /// RPC method
    pub method: String,
    /// RPC params
    pub params: Value,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    hash: String,
    data: String,
    timestamp: u64,
}

#[derive(Default)]
struct MockState {
    nodes: Vec<ServiceNode>,
    unreachable: HashSet<String>,
    scripted: HashMap<(String, String), Value>,
    mailboxes: HashMap<String, Vec<StoredEntry>>,
    calls: Vec<RecordedCall>,
    clock: u64,
}

/// Simulated storage network
#[derive(Default)]
pub struct MockNetwork {
    state: Mutex<MockState>,
}

/// Node with identity key `key` in swarm `swarm_id`
pub fn node(key: &str, swarm_id: u64) -> ServiceNode {
    ServiceNode {
        remote_ip: format!("10.1.{}.{}", key.len(), key.bytes().map(u32::from).sum::<u32>() % 256),
        storage_port: 443,
        identity_key: key.to_string(),
        encryption_key: String::new(),
        swarm_id,
    }
}

impl MockNetwork {
    /// Network whose nodes report `nodes` as the active node list
    pub fn new(nodes: Vec<ServiceNode>) -> Self {
        Self {
            state: Mutex::new(MockState {
                nodes,
                clock: FIRST_TIMESTAMP,
                ..Default::default()
            }),
        }
    }

    /// Always answer `method` on `node` with `reply`
    pub fn script(&self, node: &ServiceNode, method: &str, reply: Value) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert((node.key(), method.to_string()), reply);
    }

    /// Make every call to `node` fail at the transport level
    pub fn set_unreachable(&self, node: &ServiceNode) {
        self.state.lock().unwrap().unreachable.insert(node.key());
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls of `method` received so far
    pub fn calls_of(&self, method: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    /// Number of messages held for `owner`
    pub fn mailbox_len(&self, owner: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .mailboxes
            .get(owner)
            .map_or(0, Vec::len)
    }

    /// A session ID whose key digest equals `swarm_id`
    pub fn owner_of_swarm(&self, swarm_id: u64) -> String {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&swarm_id.to_be_bytes());
        identity::session_id_for(&key)
    }
}

impl MockState {
    fn is_owner(&self, node_key: &str, public_key: &[u8]) -> bool {
        swarm::select_swarm(&self.nodes, public_key)
            .iter()
            .any(|member| member.key() == node_key)
    }

    fn redirect(&self, public_key: &[u8]) -> Value {
        let snodes: Vec<Value> = swarm::select_swarm(&self.nodes, public_key)
            .iter()
            .map(|n| {
                json!({
                    "ip": n.remote_ip,
                    "port": n.storage_port.to_string(),
                    "pubkey_ed25519": n.identity_key,
                    "pubkey_x25519": n.encryption_key,
                })
            })
            .collect();
        json!({ "snodes": snodes })
    }

    fn storage(&mut self, node_key: &str, method: &str, params: &Value) -> Value {
        let owner = params["pubKey"].as_str().unwrap_or_default().to_string();
        let Ok(public_key) = identity::parse_session_id(&owner) else {
            return json!({ "error": "invalid pubKey" });
        };

        if !self.is_owner(node_key, &public_key) {
            return self.redirect(&public_key);
        }

        match method {
            "store" => {
                let data = params["data"].as_str().unwrap_or_default().to_string();
                let hash = hex::encode(&Sha512::digest(format!("{}{}", owner, data))[..16]);
                self.clock += 1;
                let timestamp = self.clock;

                let mailbox = self.mailboxes.entry(owner).or_default();
                if !mailbox.iter().any(|e| e.hash == hash) {
                    mailbox.push(StoredEntry { hash, data, timestamp });
                }
                json!({ "difficulty": 1 })
            }
            "retrieve" => {
                let last_hash = params["lastHash"].as_str().unwrap_or_default();
                let mailbox = self.mailboxes.get(&owner).cloned().unwrap_or_default();
                let start = mailbox
                    .iter()
                    .position(|e| e.hash == last_hash)
                    .map_or(0, |i| i + 1);

                let messages: Vec<Value> = mailbox[start..]
                    .iter()
                    .map(|e| json!({ "data": e.data, "hash": e.hash, "timestamp": e.timestamp }))
                    .collect();
                json!({ "messages": messages })
            }
            other => json!({ "error": format!("unknown method {}", other) }),
        }
    }
}

#[async_trait]
impl SnodeTransport for MockNetwork {
    async fn call(
        &self,
        node: &ServiceNode,
        endpoint: Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        let key = node.key();

        state.calls.push(RecordedCall {
            node: key.clone(),
            endpoint,
            method: method.to_string(),
            params: params.clone(),
        });

        if state.unreachable.contains(&key) {
            return Err(NetworkError::Transport {
                node: node.to_string(),
                reason: "unreachable".to_string(),
            }
            .into());
        }

        if let Some(reply) = state.scripted.get(&(key.clone(), method.to_string())) {
            return Ok(reply.clone());
        }

        Ok(match endpoint {
            Endpoint::JsonRpc => json!({
                "result": { "service_node_states": state.nodes },
            }),
            Endpoint::Storage => state.storage(&key, method, &params),
        })
    }
}
