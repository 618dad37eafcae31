//! JSON-RPC transport to storage nodes and the response shapes it carries.

use crate::network::service_node::{ServiceNode, INVALID_SWARM_ID};
use crate::transport::RawMessage;
use crate::utils::{NetworkError, ProtocolError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Which endpoint of a node a call goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Node-list RPC at `/json_rpc`
    JsonRpc,
    /// Message storage RPC at `/storage_rpc/v1`
    Storage,
}

impl Endpoint {
    /// URL of this endpoint on `node`
    pub fn url(self, node: &ServiceNode) -> String {
        match self {
            Endpoint::JsonRpc => node.rpc_url(),
            Endpoint::Storage => node.storage_url(),
        }
    }
}

/// Something that can deliver a JSON-RPC call to a storage node
///
/// Implementations return the decoded JSON body of the reply, including for
/// non-2xx statuses when the body is JSON, since nodes answer misdirected
/// requests with a redirect body and status 421.
#[async_trait]
pub trait SnodeTransport: Send + Sync {
    /// Call `method` with `params` on `node`
    async fn call(
        &self,
        node: &ServiceNode,
        endpoint: Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value>;
}

#[async_trait]
impl<T: SnodeTransport + ?Sized> SnodeTransport for Arc<T> {
    async fn call(
        &self,
        node: &ServiceNode,
        endpoint: Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        (**self).call(node, endpoint, method, params).await
    }
}

/// HTTPS transport over reqwest
///
/// Nodes present self-signed certificates, so certificate validation is off.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Transport {
                node: "-".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

/// JSON-RPC 2.0 request object for `method`
fn request_body(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": method,
        "params": params,
    })
}

#[async_trait]
impl SnodeTransport for HttpTransport {
    async fn call(
        &self,
        node: &ServiceNode,
        endpoint: Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let url = endpoint.url(node);
        let request = request_body(method, params);

        log::trace!("POST {} method={}", url, method);

        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                NetworkError::Timeout { node: node.to_string() }
            } else {
                NetworkError::Transport {
                    node: node.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if body.is_empty() && status.is_success() {
            return Ok(json!({}));
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(NetworkError::HttpStatus {
                node: node.to_string(),
                status: status.as_u16(),
            }
            .into()),
            Err(e) => Err(unexpected(method, e).into()),
        }
    }
}

/// Reply to a storage RPC
///
/// Variants are tried in order; a body matching none of them is rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StorageResponse {
    /// The node is not in the target's swarm and names nodes that are
    Redirect {
        /// Suggested nodes
        snodes: Vec<RedirectNode>,
    },
    /// Messages newer than the requested watermark
    Messages {
        /// Stored messages
        messages: Vec<WireMessage>,
    },
    /// The node refused the request
    Rejected {
        /// Node-supplied error detail
        error: Value,
    },
    /// A store was accepted
    Stored(StoreAccepted),
}

/// Body of an accepted store
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreAccepted {
    /// Proof-of-work difficulty the node currently asks for
    #[serde(default)]
    pub difficulty: Option<u64>,
    /// Hash the node assigned
    #[serde(default)]
    pub hash: Option<String>,
    /// Per-member results reported by newer nodes
    #[serde(default)]
    pub swarm: Option<Value>,
}

/// Redirect candidate
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RedirectNode {
    /// Public IP
    pub ip: String,
    /// Storage port, sent as string or integer
    #[serde(deserialize_with = "flexible_u64")]
    pub port: u64,
    /// Hex Ed25519 identity key
    #[serde(default)]
    pub pubkey_ed25519: String,
    /// Hex X25519 encryption key
    #[serde(default)]
    pub pubkey_x25519: String,
}

/// Stored message as returned by `retrieve`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireMessage {
    /// Base64 payload
    pub data: String,
    /// Node-assigned hash
    pub hash: String,
    /// Node-assigned timestamp in milliseconds
    #[serde(deserialize_with = "flexible_u64")]
    pub timestamp: u64,
}

/// JSON-RPC reply wrapper of `/json_rpc`
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    /// Result on success
    pub result: Option<T>,
    /// Error on failure
    pub error: Option<Value>,
}

/// Result of `get_n_service_nodes`
#[derive(Debug, Deserialize)]
pub struct ServiceNodeStates {
    /// Every active node
    pub service_node_states: Vec<ServiceNode>,
}

impl StorageResponse {
    /// Parse the JSON reply to storage `method`
    pub fn parse(method: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| unexpected(method, e).into())
    }

    /// Short name of the variant for logs
    pub fn kind(&self) -> &'static str {
        match self {
            StorageResponse::Redirect { .. } => "redirect",
            StorageResponse::Messages { .. } => "messages",
            StorageResponse::Rejected { .. } => "rejected",
            StorageResponse::Stored(_) => "stored",
        }
    }
}

impl RedirectNode {
    /// Descriptor for following this redirect
    pub fn to_service_node(&self) -> Result<ServiceNode> {
        let port = u16::try_from(self.port).map_err(|_| ProtocolError::UnexpectedResponse {
            method: "redirect".to_string(),
            reason: format!("port {} out of range", self.port),
        })?;

        Ok(ServiceNode {
            remote_ip: self.ip.clone(),
            storage_port: port,
            identity_key: self.pubkey_ed25519.clone(),
            encryption_key: self.pubkey_x25519.clone(),
            swarm_id: INVALID_SWARM_ID,
        })
    }
}

impl WireMessage {
    /// Decode the base64 payload
    pub fn into_raw(self) -> Result<RawMessage> {
        let data = BASE64.decode(self.data.as_bytes())?;
        Ok(RawMessage::new(data, self.hash, self.timestamp))
    }
}

fn unexpected(method: &str, e: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        method: method.to_string(),
        reason: e.to_string(),
    }
}

fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Number(u64),
        String(String),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n),
        StringOrNumber::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
