//! Idempotent persistence of canonical events.
//!
//! The unique key on `(source, id)` is the sole consistency backstop:
//! concurrent duplicate deliveries of the same natural id are resolved by
//! the store, not by ordering guarantees upstream.

use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
};

use hookrelay_core::CanonicalEvent;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS events_raw (
    event_type   TEXT NOT NULL,
    id           TEXT NOT NULL,
    metadata     TEXT NOT NULL,
    time_created TEXT NOT NULL,
    signature    TEXT NOT NULL,
    msg_id       TEXT NOT NULL,
    source       TEXT NOT NULL,
    UNIQUE (source, id)
);
"#;

const INSERT_ONLY_SQL: &str = "INSERT OR IGNORE INTO events_raw \
    (event_type, id, metadata, time_created, signature, msg_id, source) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const REPLACE_METADATA_SQL: &str = "INSERT INTO events_raw \
    (event_type, id, metadata, time_created, signature, msg_id, source) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
    ON CONFLICT (source, id) DO UPDATE SET metadata = excluded.metadata";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("write failed: {0}")]
    Write(#[from] rusqlite::Error),
}

/// What a duplicate `(source, id)` does to the stored row. A per-source
/// configuration knob, not behavior baked into a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// First write wins; replays are dropped at the store level.
    InsertOnly,
    /// Replays refresh `metadata` only, leaving `time_created` and the rest
    /// of the original row intact.
    ReplaceMetadata,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert-only" => Ok(Self::InsertOnly),
            "replace-metadata" => Ok(Self::ReplaceMetadata),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected 'insert-only' or 'replace-metadata')"
            )),
        }
    }
}

/// Handle on the `events_raw` table.
#[derive(Clone)]
pub struct EventStore {
    conn: Arc<Mutex<Connection>>,
}

impl EventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path).map_err(StoreError::Open)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(StoreError::Open)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(CREATE_TABLE_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Writes one event under the given duplicate policy. Returns the number
    /// of rows changed; 0 means an insert-only replay was dropped.
    pub fn upsert(
        &self,
        event: &CanonicalEvent,
        policy: DuplicatePolicy,
    ) -> Result<usize, StoreError> {
        let sql = match policy {
            DuplicatePolicy::InsertOnly => INSERT_ONLY_SQL,
            DuplicatePolicy::ReplaceMetadata => REPLACE_METADATA_SQL,
        };
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            sql,
            params![
                event.event_type,
                event.natural_id,
                event.metadata,
                event.time_created.to_rfc3339(),
                event.signature,
                event.message_id,
                event.source,
            ],
        )?;
        Ok(rows)
    }

    /// Looks up a stored row by its natural key.
    pub fn fetch(
        &self,
        source: &str,
        natural_id: &str,
    ) -> Result<Option<StoredEvent>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT event_type, metadata, time_created, signature, msg_id \
                 FROM events_raw WHERE source = ?1 AND id = ?2",
                params![source, natural_id],
                |row| {
                    Ok(StoredEvent {
                        source: source.to_string(),
                        natural_id: natural_id.to_string(),
                        event_type: row.get(0)?,
                        metadata: row.get(1)?,
                        time_created: row.get(2)?,
                        signature: row.get(3)?,
                        message_id: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM events_raw", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

/// Row as persisted (timestamps as RFC 3339 text).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub source: String,
    pub natural_id: String,
    pub event_type: String,
    pub metadata: String,
    pub time_created: String,
    pub signature: String,
    pub message_id: String,
}
