//! Typed storage-node RPCs: node list, store and retrieve.
//!
//! Storage calls follow redirects breadth-first. Every node is asked at most
//! once per operation, and the number of nodes asked is bounded by
//! `max_redirects`.

use crate::network::rpc::{
    Endpoint, JsonRpcResponse, ServiceNodeStates, SnodeTransport, StorageResponse,
};
use crate::network::service_node::ServiceNode;
use crate::transport::RawMessage;
use crate::utils::{CourierError, NetworkError, ProtocolError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};

/// Method name of the node-list RPC
pub const GET_SERVICE_NODES: &str = "get_n_service_nodes";

/// Method name of the store RPC
pub const STORE: &str = "store";

/// Method name of the retrieve RPC
pub const RETRIEVE: &str = "retrieve";

/// Client for the storage-node RPCs
#[derive(Debug, Clone)]
pub struct SnodeClient<T> {
    transport: T,
    message_ttl_secs: u64,
    max_redirects: usize,
}

impl<T: SnodeTransport> SnodeClient<T> {
    /// Create a client storing messages for `message_ttl_secs`
    pub fn new(transport: T, message_ttl_secs: u64, max_redirects: usize) -> Self {
        Self {
            transport,
            message_ttl_secs,
            max_redirects,
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask `node` for every active storage node
    pub async fn get_snode_list(&self, node: &ServiceNode) -> Result<Vec<ServiceNode>> {
        let params = json!({
            "active_only": true,
            "fields": {
                "public_ip": true,
                "storage_port": true,
                "pubkey_ed25519": true,
                "pubkey_x25519": true,
                "swarm_id": true,
            },
        });

        let value = self
            .transport
            .call(node, Endpoint::JsonRpc, GET_SERVICE_NODES, params)
            .await?;

        let response: JsonRpcResponse<ServiceNodeStates> = serde_json::from_value(value)
            .map_err(|e| unexpected(GET_SERVICE_NODES, e.to_string()))?;

        if let Some(error) = response.error {
            return Err(unexpected(GET_SERVICE_NODES, error.to_string()).into());
        }

        let states = response
            .result
            .ok_or_else(|| unexpected(GET_SERVICE_NODES, "missing result"))?;

        let nodes: Vec<ServiceNode> = states
            .service_node_states
            .into_iter()
            .filter(|n| !n.remote_ip.is_empty() && n.storage_port != 0)
            .collect();

        log::debug!("{} reported {} storage nodes", node, nodes.len());
        Ok(nodes)
    }

    /// Store `data` for `recipient` starting at `node`
    ///
    /// Returns the node that accepted the message.
    pub async fn store_message(
        &self,
        node: &ServiceNode,
        recipient: &str,
        data: &[u8],
    ) -> Result<ServiceNode> {
        let params = json!({
            "pubKey": recipient,
            "ttl": self.message_ttl_secs.to_string(),
            "timestamp": chrono::Utc::now().timestamp_millis().to_string(),
            "data": BASE64.encode(data),
        });

        let (accepted_by, response) = self.call_following_redirects(node, STORE, params).await?;
        match response {
            StorageResponse::Stored(_) => Ok(accepted_by),
            other => Err(unexpected(STORE, format!("{} reply", other.kind())).into()),
        }
    }

    /// Retrieve messages for `owner` newer than `last_hash` starting at `node`
    ///
    /// An empty `last_hash` asks for everything the swarm holds.
    pub async fn fetch_messages(
        &self,
        node: &ServiceNode,
        owner: &str,
        last_hash: &str,
    ) -> Result<Vec<RawMessage>> {
        let params = json!({
            "pubKey": owner,
            "lastHash": last_hash,
        });

        let (_, response) = self.call_following_redirects(node, RETRIEVE, params).await?;
        match response {
            StorageResponse::Messages { messages } => {
                messages.into_iter().map(|m| m.into_raw()).collect()
            }
            other => Err(unexpected(RETRIEVE, format!("{} reply", other.kind())).into()),
        }
    }

    /// Call storage `method` on `start`, then on redirect candidates in the
    /// order they were suggested, until a node answers with something other
    /// than a redirect or a refusal
    async fn call_following_redirects(
        &self,
        start: &ServiceNode,
        method: &str,
        params: Value,
    ) -> Result<(ServiceNode, StorageResponse)> {
        let mut queue = VecDeque::from([start.clone()]);
        let mut tried: HashSet<String> = HashSet::new();
        let mut redirected = false;
        let mut last_error: Option<CourierError> = None;

        while let Some(node) = queue.pop_front() {
            if tried.len() > self.max_redirects {
                break;
            }
            if !tried.insert(node.key()) {
                continue;
            }

            let reply = match self
                .transport
                .call(&node, Endpoint::Storage, method, params.clone())
                .await
                .and_then(|value| StorageResponse::parse(method, value))
            {
                Ok(reply) => reply,
                Err(e) => {
                    log::debug!("{} on {} failed: {}", method, node, e);
                    last_error = Some(e);
                    continue;
                }
            };

            match reply {
                StorageResponse::Redirect { snodes } => {
                    redirected = true;
                    log::debug!("{} redirected by {} to {} nodes", method, node, snodes.len());
                    for candidate in snodes {
                        match candidate.to_service_node() {
                            Ok(candidate) if !tried.contains(&candidate.key()) => {
                                queue.push_back(candidate)
                            }
                            Ok(_) => {}
                            Err(e) => log::debug!("skipping redirect candidate: {}", e),
                        }
                    }
                }
                StorageResponse::Rejected { error } => {
                    log::debug!("{} rejected by {}: {}", method, node, error);
                    last_error = Some(unexpected(method, error.to_string()).into());
                }
                reply => return Ok((node, reply)),
            }
        }

        if redirected {
            return Err(NetworkError::RedirectsExhausted { tried: tried.len() }.into());
        }
        Err(last_error.unwrap_or_else(|| NetworkError::NoNodes.into()))
    }
}

fn unexpected(method: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        method: method.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::{node, MockNetwork};
    use std::sync::Arc;

    fn client(network: &Arc<MockNetwork>) -> SnodeClient<Arc<MockNetwork>> {
        SnodeClient::new(Arc::clone(network), 1_209_600, 16)
    }

    #[tokio::test]
    async fn test_get_snode_list() {
        let nodes = vec![node("aa", 1), node("bb", 2)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        let seed = ServiceNode::new("seed.test", 443);

        let listed = client(&network).get_snode_list(&seed).await.unwrap();
        assert_eq!(listed, nodes);

        let call = &network.calls()[0];
        assert_eq!(call.method, GET_SERVICE_NODES);
        assert_eq!(call.endpoint, Endpoint::JsonRpc);
        assert_eq!(call.params["active_only"], true);
        assert_eq!(call.params["fields"]["swarm_id"], true);
    }

    #[tokio::test]
    async fn test_node_list_error_reply() {
        let network = Arc::new(MockNetwork::new(vec![]));
        let seed = ServiceNode::new("seed.test", 443);
        network.script(&seed, GET_SERVICE_NODES, json!({"error": "busy"}));

        assert!(client(&network).get_snode_list(&seed).await.is_err());
    }

    #[tokio::test]
    async fn test_store_params() {
        let nodes = vec![node("aa", 1)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        let recipient = network.owner_of_swarm(1);

        let accepted = client(&network)
            .store_message(&nodes[0], &recipient, b"payload")
            .await
            .unwrap();
        assert_eq!(accepted.key(), "aa");

        let call = &network.calls()[0];
        assert_eq!(call.endpoint, Endpoint::Storage);
        assert_eq!(call.params["pubKey"], recipient.as_str());
        assert_eq!(call.params["ttl"], "1209600");
        assert_eq!(call.params["data"], BASE64.encode(b"payload"));
        assert!(call.params["timestamp"].as_str().unwrap().parse::<u64>().is_ok());
    }

    #[tokio::test]
    async fn test_store_follows_redirects_in_order() {
        let nodes = vec![node("aa", 1), node("bb", 1), node("cc", 2)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        let recipient = network.owner_of_swarm(1);

        network.script(
            &nodes[2],
            STORE,
            json!({"snodes": [
                {"ip": nodes[0].remote_ip, "port": "443", "pubkey_ed25519": "aa"},
                {"ip": nodes[1].remote_ip, "port": 443, "pubkey_ed25519": "bb"},
            ]}),
        );
        network.set_unreachable(&nodes[0]);

        let accepted = client(&network)
            .store_message(&nodes[2], &recipient, b"x")
            .await
            .unwrap();
        assert_eq!(accepted.key(), "bb");

        let order: Vec<String> = network.calls().iter().map(|c| c.node.clone()).collect();
        assert_eq!(order, vec!["cc", "aa", "bb"]);
    }

    #[tokio::test]
    async fn test_redirect_loop_terminates() {
        let nodes = vec![node("aa", 1), node("bb", 1)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        let back_and_forth = |target: &ServiceNode| {
            json!({"snodes": [{"ip": target.remote_ip, "port": 443, "pubkey_ed25519": target.identity_key}]})
        };
        network.script(&nodes[0], STORE, back_and_forth(&nodes[1]));
        network.script(&nodes[1], STORE, back_and_forth(&nodes[0]));

        let err = client(&network)
            .store_message(&nodes[0], "05ab", b"x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourierError::Network(NetworkError::RedirectsExhausted { tried: 2 })
        ));
        assert_eq!(network.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_redirect_bound() {
        let nodes: Vec<ServiceNode> = (0..40).map(|i| node(&format!("{:02x}", i), 1)).collect();
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        for (i, n) in nodes.iter().enumerate() {
            let next = &nodes[(i + 1) % nodes.len()];
            network.script(
                n,
                STORE,
                json!({"snodes": [{"ip": next.remote_ip, "port": 443, "pubkey_ed25519": next.identity_key}]}),
            );
        }

        let result = SnodeClient::new(Arc::clone(&network), 60, 4)
            .store_message(&nodes[0], "05ab", b"x")
            .await;
        assert!(result.is_err());
        assert_eq!(network.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_unreachable_node_reports_transport_error() {
        let nodes = vec![node("aa", 1)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        network.set_unreachable(&nodes[0]);

        let err = client(&network)
            .fetch_messages(&nodes[0], "05ab", "")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Network(NetworkError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_fetch_rejects_store_shaped_reply() {
        let nodes = vec![node("aa", 1)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        network.script(&nodes[0], RETRIEVE, json!({"difficulty": 1}));

        let err = client(&network)
            .fetch_messages(&nodes[0], "05ab", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourierError::Protocol(ProtocolError::UnexpectedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_after_watermark() {
        let nodes = vec![node("aa", 1)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        let owner = network.owner_of_swarm(1);
        let rpc = client(&network);

        rpc.store_message(&nodes[0], &owner, b"one").await.unwrap();
        rpc.store_message(&nodes[0], &owner, b"two").await.unwrap();

        let all = rpc.fetch_messages(&nodes[0], &owner, "").await.unwrap();
        assert_eq!(all.len(), 2);

        let newer = rpc.fetch_messages(&nodes[0], &owner, &all[0].hash).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].data, b"two");
    }

    #[tokio::test]
    async fn test_fetch_follows_swarm_redirect() {
        let nodes = vec![node("aa", 1), node("bb", 1 << 40)];
        let network = Arc::new(MockNetwork::new(nodes.clone()));
        let owner = network.owner_of_swarm(1);
        let rpc = client(&network);

        rpc.store_message(&nodes[0], &owner, b"kept").await.unwrap();

        let messages = rpc.fetch_messages(&nodes[1], &owner, "").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, b"kept");

        let retrieves = network.calls_of(RETRIEVE);
        let order: Vec<&str> = retrieves.iter().map(|c| c.node.as_str()).collect();
        assert_eq!(order, vec!["bb", "aa"]);
        assert!(retrieves.iter().all(|c| c.params["pubKey"] == owner.as_str()));
    }
}
