//! Volatile message store.

use crate::storage::{MessageStore, Watermark};
use crate::transport::RawMessage;
use crate::utils::{Result, StorageError};
use std::collections::HashMap;

/// Message store held in memory, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: HashMap<String, RawMessage>,
    watermark: Option<Watermark>,
    closed: bool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(StorageError::Closed.into());
        }
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    fn has_message(&self, hash: &str) -> Result<bool> {
        self.check_open()?;
        Ok(self.messages.contains_key(hash))
    }

    fn put(&mut self, message: &RawMessage) -> Result<()> {
        self.check_open()?;
        if self.messages.contains_key(&message.hash) {
            return Ok(());
        }

        let newer = self
            .watermark
            .as_ref()
            .map_or(true, |w| message.timestamp > w.timestamp);
        if newer {
            self.watermark = Some(Watermark {
                hash: message.hash.clone(),
                timestamp: message.timestamp,
            });
        }

        self.messages.insert(message.hash.clone(), message.clone());
        Ok(())
    }

    fn watermark(&self) -> Result<Option<Watermark>> {
        self.check_open()?;
        Ok(self.watermark.clone())
    }

    fn messages(&self) -> Result<Vec<RawMessage>> {
        self.check_open()?;
        let mut all: Vec<RawMessage> = self.messages.values().cloned().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
        Ok(all)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
