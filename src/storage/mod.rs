//! Local record of retrieved messages.
//!
//! The store keeps every raw message the client has seen, keyed by its
//! node-assigned hash, and tracks the hash of the newest one. That hash is
//! sent as the retrieval watermark so nodes only return newer messages.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::transport::RawMessage;
use crate::utils::{CourierConfig, Result, StoreBackend};

/// Newest message seen so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    /// Hash of the newest message
    pub hash: String,
    /// Its node-assigned timestamp in milliseconds
    pub timestamp: u64,
}

/// Persistence for retrieved messages
///
/// `put` is idempotent per hash. The watermark moves to a message only when
/// its timestamp is strictly greater than the current watermark's, so among
/// equal timestamps the first one stored wins.
pub trait MessageStore: Send {
    /// Whether a message with `hash` has been stored
    fn has_message(&self, hash: &str) -> Result<bool>;

    /// Record `message`; storing a known hash again is a no-op
    fn put(&mut self, message: &RawMessage) -> Result<()>;

    /// The newest message seen, if any
    fn watermark(&self) -> Result<Option<Watermark>>;

    /// Every stored message, oldest first
    fn messages(&self) -> Result<Vec<RawMessage>>;

    /// Release the backend. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Hash of the newest message, or an empty string
    fn last_hash(&self) -> Result<String> {
        Ok(self.watermark()?.map(|w| w.hash).unwrap_or_default())
    }
}

impl<S: MessageStore + ?Sized> MessageStore for Box<S> {
    fn has_message(&self, hash: &str) -> Result<bool> {
        (**self).has_message(hash)
    }

    fn put(&mut self, message: &RawMessage) -> Result<()> {
        (**self).put(message)
    }

    fn watermark(&self) -> Result<Option<Watermark>> {
        (**self).watermark()
    }

    fn messages(&self) -> Result<Vec<RawMessage>> {
        (**self).messages()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Open the backend selected by `config`
pub fn open_store(config: &CourierConfig) -> Result<Box<dyn MessageStore>> {
    match config.storage.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(config.storage.database_path())?)),
    }
}
