//! SQLite-backed message store.

use crate::storage::{MessageStore, Watermark};
use crate::transport::RawMessage;
use crate::utils::{ProtocolError, Result, StorageError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    hash      TEXT PRIMARY KEY NOT NULL,
    contents  BLOB NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages (timestamp);
"#;

/// Message store persisted in a SQLite database
///
/// The watermark is the row with the greatest timestamp; among equal
/// timestamps the earliest inserted row wins.
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!("failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)?;
        log::debug!("opened message database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| StorageError::Closed.into())
    }
}

fn to_sql_timestamp(timestamp: u64) -> Result<i64> {
    i64::try_from(timestamp).map_err(|_| {
        ProtocolError::InvalidMessage {
            reason: format!("timestamp {} out of range", timestamp),
        }
        .into()
    })
}

impl MessageStore for SqliteStore {
    fn has_message(&self, hash: &str) -> Result<bool> {
        let exists: bool = self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE hash = ?1)",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn put(&mut self, message: &RawMessage) -> Result<()> {
        let timestamp = to_sql_timestamp(message.timestamp)?;
        self.conn()?.execute(
            "INSERT OR IGNORE INTO messages (hash, contents, timestamp) VALUES (?1, ?2, ?3)",
            params![message.hash, message.data, timestamp],
        )?;
        Ok(())
    }

    fn watermark(&self) -> Result<Option<Watermark>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT hash, timestamp FROM messages ORDER BY timestamp DESC, rowid ASC LIMIT 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(hash, timestamp)| Watermark {
            hash,
            timestamp: timestamp.max(0) as u64,
        }))
    }

    fn messages(&self) -> Result<Vec<RawMessage>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT hash, contents, timestamp FROM messages ORDER BY timestamp, rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(RawMessage::new(
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(0)?,
                row.get::<_, i64>(2)?.max(0) as u64,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
            log::debug!("closed message database");
        }
        Ok(())
    }
}
