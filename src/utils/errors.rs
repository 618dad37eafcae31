//! Error types and handling for the swarm courier.
//!
//! Errors are grouped by how a caller is expected to react to them: transport
//! failures are retried by the polling driver, protocol and cryptographic
//! failures are skipped one message at a time, and configuration or identity
//! failures stop the process at startup.

use thiserror::Error;

/// Result type alias for the courier library
pub type Result<T> = std::result::Result<T, CourierError>;

/// Top-level error type for all courier operations
#[derive(Error, Debug, Clone)]
pub enum CourierError {
    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Network and storage-node RPC errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Wire framing and response-shape errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Message store backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration and setup errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Base64 encoding/decoding errors
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Generic error for unexpected conditions
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Seed file does not hold exactly one secret seed
    #[error("Bad seed size: expected {expected} bytes, got {actual}")]
    BadSeedSize {
        /// Required length in bytes
        expected: usize,
        /// Length found
        actual: usize,
    },

    /// Edwards point could not be decoded for Montgomery conversion
    #[error("Key conversion failed: {reason}")]
    KeyConversion {
        /// Underlying cause
        reason: String,
    },

    /// Invalid key format or size
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Underlying cause
        reason: String,
    },

    /// Sealed-box encryption failure
    #[error("Encryption failed: {reason}")]
    Encryption {
        /// Underlying cause
        reason: String,
    },

    /// Sealed-box open failure (wrong recipient or corrupted ciphertext)
    #[error("Decryption failed: {reason}")]
    Decryption {
        /// Underlying cause
        reason: String,
    },

    /// Signature verification failure
    #[error("Signature verification failed")]
    SignatureVerification,
}

/// Network and storage-node RPC errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Request could not be delivered or the response could not be read
    #[error("Transport error talking to {node}: {reason}")]
    Transport {
        /// Node the request went to
        node: String,
        /// Underlying cause
        reason: String,
    },

    /// Request exceeded the configured timeout
    #[error("Request to {node} timed out")]
    Timeout {
        /// Node the request went to
        node: String,
    },

    /// Node answered with an error status and no parseable body
    #[error("Node {node} answered with HTTP status {status}")]
    HttpStatus {
        /// Node the request went to
        node: String,
        /// HTTP status code
        status: u16,
    },

    /// No cached service nodes to talk to
    #[error("No service nodes known")]
    NoNodes,

    /// Every seed node failed during bootstrap
    #[error("Bootstrap failed: no seed node returned a node list")]
    BootstrapFailed,

    /// A redirect chain ended without any node accepting the request
    #[error("All {tried} redirect candidates failed")]
    RedirectsExhausted {
        /// Nodes asked before giving up
        tried: usize,
    },

    /// No member of the recipient's swarm accepted the message
    #[error("Could not deliver message to {recipient}")]
    SendFailed {
        /// Session ID of the recipient
        recipient: String,
    },
}

/// Wire framing and response-shape errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A protobuf layer failed to decode
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Underlying cause
        reason: String,
    },

    /// Missing required message field
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the field
        field: String,
    },

    /// Decrypted buffer has no padding delimiter
    #[error("Invalid padding: no delimiter byte found")]
    BadPadding,

    /// Node response matched none of the known shapes
    #[error("Unexpected response from {method}: {reason}")]
    UnexpectedResponse {
        /// RPC method called
        method: String,
        /// Underlying cause
        reason: String,
    },

    /// Session ID is not a version tag followed by a hex public key
    #[error("Invalid session ID: {session_id}")]
    InvalidSessionId {
        /// The rejected session ID
        session_id: String,
    },

    /// Invalid message format
    #[error("Invalid message format: {reason}")]
    InvalidMessage {
        /// Underlying cause
        reason: String,
    },
}

/// Message store backend errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend reported a failure
    #[error("Backend failure: {0}")]
    Backend(String),

    /// Store was already closed
    #[error("Store is closed")]
    Closed,
}

/// Configuration and setup errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Missing required configuration
    #[error("Missing configuration: {field}")]
    MissingField {
        /// Name of the field
        field: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue {
        /// Name of the field
        field: String,
        /// The rejected value
        value: String,
    },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path involved
        path: String,
    },

    /// Configuration parsing error
    #[error("Configuration parse error: {reason}")]
    ParseError {
        /// Underlying cause
        reason: String,
    },

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Directory creation failure
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        /// Path involved
        path: String,
    },
}

impl CourierError {
    /// Creates a new unexpected error with a custom message
    pub fn unexpected<S: Into<String>>(msg: S) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Returns true if retrying the whole cycle later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Protocol(_) | Self::Base64(_) | Self::Serialization(_) => true,
            Self::Crypto(err) => !matches!(
                err,
                CryptoError::BadSeedSize { .. } | CryptoError::InvalidKey { .. }
            ),
            Self::Storage(err) => !matches!(err, StorageError::Closed),
            Self::Config(_) | Self::Io(_) | Self::Unexpected(_) => false,
        }
    }

    /// Returns true if this error concerns a single inbound message, which
    /// the orchestrator skips before moving on to the rest of the batch
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Self::Protocol(
                ProtocolError::MalformedEnvelope { .. }
                    | ProtocolError::MissingField { .. }
                    | ProtocolError::BadPadding
                    | ProtocolError::InvalidMessage { .. }
            ) | Self::Crypto(
                CryptoError::Decryption { .. }
                    | CryptoError::SignatureVerification
                    | CryptoError::KeyConversion { .. }
            )
        )
    }

    /// Returns true if this error indicates a tampered or foreign payload
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::SignatureVerification)
                | Self::Crypto(CryptoError::Decryption { .. })
        )
    }
}

impl From<std::io::Error> for CourierError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<prost::DecodeError> for CourierError {
    fn from(err: prost::DecodeError) -> Self {
        Self::Protocol(ProtocolError::MalformedEnvelope {
            reason: err.to_string(),
        })
    }
}

impl From<rusqlite::Error> for CourierError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Backend(err.to_string()))
    }
}
