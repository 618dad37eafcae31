//! Client lifecycle: node discovery, retrieval and sending.
//!
//! A [`Client`] owns an identity, a message store and a transport. Callers
//! drive it by alternating [`Client::update`] (keep the node map fresh) with
//! [`Client::fetch_new_messages`] and [`Client::send_to`].

use crate::{
    crypto::{identity, Identity},
    network::{SeedNode, ServiceNode, SnodeClient, SnodeTransport, SwarmMap},
    storage::MessageStore,
    transport::{envelope, OutgoingMessage, PlainMessage, RawMessage},
    utils::{CourierConfig, NetworkError, Result},
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Settings the client needs from [`CourierConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Nodes queried when the node map is empty
    pub seed_nodes: Vec<SeedNode>,
    /// How long a node list stays fresh
    pub refresh_interval: Duration,
    /// How long nodes keep a stored message, in seconds
    pub message_ttl_secs: u64,
    /// Upper bound on nodes asked per storage call
    pub max_redirects: usize,
}

impl From<&CourierConfig> for ClientConfig {
    fn from(config: &CourierConfig) -> Self {
        Self {
            seed_nodes: config.network.seed_nodes.clone(),
            refresh_interval: config.network.refresh_interval(),
            message_ttl_secs: config.network.message_ttl_secs,
            max_redirects: config.network.max_redirects,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&CourierConfig::default())
    }
}

/// Messaging client for one identity
pub struct Client<T, S> {
    identity: Identity,
    config: ClientConfig,
    snodes: SwarmMap,
    rpc: SnodeClient<T>,
    store: S,
    last_accepting_node: HashMap<String, ServiceNode>,
}

impl<T: SnodeTransport, S: MessageStore> Client<T, S> {
    /// Create a client; no network traffic happens until [`Client::update`]
    pub fn new(identity: Identity, store: S, transport: T, config: ClientConfig) -> Self {
        Self {
            identity,
            snodes: SwarmMap::new(config.refresh_interval),
            rpc: SnodeClient::new(transport, config.message_ttl_secs, config.max_redirects),
            config,
            store,
            last_accepting_node: HashMap::new(),
        }
    }

    /// Our session ID
    pub fn session_id(&self) -> String {
        self.identity.session_id()
    }

    /// Our identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Cached node map
    pub fn snode_map(&self) -> &SwarmMap {
        &self.snodes
    }

    /// Message store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Node that last accepted a message for `recipient`
    pub fn last_accepting_node(&self, recipient: &str) -> Option<&ServiceNode> {
        self.last_accepting_node.get(recipient)
    }

    /// Bootstrap or refresh the node map
    ///
    /// With an empty map the seeds are tried in order until one answers with
    /// a non-empty list. With a warm map a random known node is asked once the
    /// refresh interval has passed; if that fails the stale map is kept.
    ///
    /// # Errors
    ///
    /// `NetworkError::BootstrapFailed` when the map is empty and no seed
    /// produced a node list
    pub async fn update(&mut self) -> Result<()> {
        if self.snodes.is_empty() {
            return self.bootstrap().await;
        }

        if !self.snodes.should_refresh(Instant::now()) {
            return Ok(());
        }

        let Some(node) = self.snodes.random() else {
            return Ok(());
        };

        match self.rpc.get_snode_list(&node).await {
            Ok(nodes) if !nodes.is_empty() => {
                log::debug!("refreshed node map from {}: {} nodes", node, nodes.len());
                self.snodes.replace(nodes, Instant::now());
            }
            Ok(_) => log::warn!("{} returned an empty node list, keeping cached map", node),
            Err(e) => log::warn!("node list refresh from {} failed, keeping cached map: {}", node, e),
        }

        Ok(())
    }

    async fn bootstrap(&mut self) -> Result<()> {
        for seed in &self.config.seed_nodes {
            let node = seed.to_service_node();
            match self.rpc.get_snode_list(&node).await {
                Ok(nodes) if !nodes.is_empty() => {
                    log::info!("bootstrapped from {}: {} nodes", node, nodes.len());
                    self.snodes.replace(nodes, Instant::now());
                    return Ok(());
                }
                Ok(_) => log::warn!("seed {} returned an empty node list", node),
                Err(e) => log::warn!("seed {} failed: {}", node, e),
            }
        }

        Err(NetworkError::BootstrapFailed.into())
    }

    /// Retrieve, record and decrypt messages newer than the watermark
    ///
    /// Each message is recorded before it is decrypted, so a message that
    /// fails to decrypt is never retrieved again. Messages that fail to
    /// decode or verify are logged and skipped.
    ///
    /// # Errors
    ///
    /// Network and response errors from the retrieve call, and storage errors
    /// raised before any message of the batch was opened. A storage error
    /// later in the batch ends it early: the messages opened so far are
    /// returned and the unrecorded rest is retrieved again on the next call.
    pub async fn fetch_new_messages(&mut self) -> Result<Vec<PlainMessage>> {
        let public_key = self.identity.public_key_bytes();
        let node = self
            .snodes
            .random_in_swarm(&public_key)
            .or_else(|| self.snodes.random())
            .ok_or(NetworkError::NoNodes)?;

        let last_hash = self.store.last_hash()?;
        let raw_messages = self
            .rpc
            .fetch_messages(&node, &self.session_id(), &last_hash)
            .await?;

        log::debug!("{} returned {} messages after '{}'", node, raw_messages.len(), last_hash);

        let mut plain = Vec::new();
        for raw in raw_messages {
            match self.record(&raw) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if plain.is_empty() => return Err(e),
                Err(e) => {
                    log::warn!(
                        "recording {} failed, returning {} messages already opened: {}",
                        raw.hash,
                        plain.len(),
                        e
                    );
                    break;
                }
            }

            match self.decrypt_message(&raw) {
                Ok(message) => plain.push(message),
                Err(e) if e.is_security_violation() => {
                    log::warn!("rejected message {}: {}", raw.hash, e)
                }
                Err(e) => log::warn!("skipping undecodable message {}: {}", raw.hash, e),
            }
        }

        Ok(plain)
    }

    /// Record `raw` unless it is already known; true if it was new
    fn record(&mut self, raw: &RawMessage) -> Result<bool> {
        if self.store.has_message(&raw.hash)? {
            return Ok(false);
        }
        self.store.put(raw)?;
        Ok(true)
    }

    /// Open a raw message addressed to us
    pub fn decrypt_message(&self, raw: &RawMessage) -> Result<PlainMessage> {
        let decoded = envelope::decode(&self.identity, &raw.data)?;
        PlainMessage::from_decoded(decoded)
    }

    /// Send `body` as a plain text message to `recipient`
    pub async fn send_to(&mut self, recipient: &str, body: &str) -> Result<()> {
        self.send_message(recipient, &OutgoingMessage::text(body)).await
    }

    /// Encrypt `message` for `recipient` and store it on every member of the
    /// recipient's swarm
    ///
    /// # Errors
    ///
    /// `ProtocolError::InvalidSessionId` for a malformed recipient,
    /// `NetworkError::NoNodes` when no swarm is known, and
    /// `NetworkError::SendFailed` when no member accepted the message
    pub async fn send_message(&mut self, recipient: &str, message: &OutgoingMessage) -> Result<()> {
        let recipient_key = identity::parse_session_id(recipient)?;
        let now = chrono::Utc::now().timestamp_millis() as u64;
        let wire = envelope::encode(
            &self.identity,
            recipient,
            &message.to_content_bytes(now),
            now,
        )?;

        let swarm = self.snodes.swarm_for(&recipient_key);
        if swarm.is_empty() {
            return Err(NetworkError::NoNodes.into());
        }

        let mut accepted_by: Option<ServiceNode> = None;
        for node in &swarm {
            match self.rpc.store_message(node, recipient, &wire).await {
                Ok(accepted) => {
                    log::debug!("{} accepted message for {}", accepted, recipient);
                    accepted_by.get_or_insert(accepted);
                }
                Err(e) => log::warn!("store on {} failed: {}", node, e),
            }
        }

        match accepted_by {
            Some(node) => {
                log::info!("sent message to {}", recipient);
                self.last_accepting_node.insert(recipient.to_string(), node);
                Ok(())
            }
            None => Err(NetworkError::SendFailed {
                recipient: recipient.to_string(),
            }
            .into()),
        }
    }

    /// Release the message store
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}
