//! SQLite-backed storage adapter.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::{MemoryId, MemoryKind, MemoryRecord, Metadata};
use crate::retrieval::cosine_similarity;

use super::schema::{initialize_schema, is_initialized};
use super::{StorageAdapter, VectorIndex};

const SELECT_COLUMNS: &str =
    "SELECT id, kind, content, embedding, metadata, created_at, updated_at, source FROM memories";

/// SQLite-backed record store.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if !is_initialized(&conn) {
            initialize_schema(&conn)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&conn).map_err(Error::from)
    }

    fn load_all(&self, embedded_only: bool) -> Result<Vec<MemoryRecord>> {
        let sql = if embedded_only {
            format!("{} WHERE embedding IS NOT NULL ORDER BY seq", SELECT_COLUMNS)
        } else {
            format!("{} ORDER BY seq", SELECT_COLUMNS)
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map([], |row| row_to_record(row))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let id: String = row.get(0)?;
    let kind_str: String = row.get(1)?;
    let kind = kind_str
        .parse::<MemoryKind>()
        .map_err(|e| conversion_error(1, e))?;

    let embedding = row
        .get::<_, Option<Vec<u8>>>(3)?
        .map(|bytes| decode_embedding(&bytes));

    let metadata = match row.get::<_, Option<String>>(4)? {
        Some(text) => serde_json::from_str::<Metadata>(&text).map_err(|e| conversion_error(4, e))?,
        None => Metadata::new(),
    };

    let created_at = parse_datetime(5, &row.get::<_, String>(5)?)?;
    let updated_at = row
        .get::<_, Option<String>>(6)?
        .map(|s| parse_datetime(6, &s))
        .transpose()?;

    Ok(MemoryRecord {
        id: MemoryId::from(id),
        kind,
        content: row.get(2)?,
        embedding,
        metadata,
        created_at,
        updated_at,
        source: row.get(7)?,
        relevance: None,
    })
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        let metadata = if record.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.metadata)?)
        };
        let embedding_blob = record.embedding.as_deref().map(encode_embedding);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memories (id, kind, content, embedding, metadata, created_at, updated_at, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    kind = excluded.kind,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    metadata = excluded.metadata,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    source = excluded.source",
                params![
                    record.id.as_str(),
                    record.kind.as_str(),
                    record.content,
                    embedding_blob,
                    metadata,
                    format_datetime(&record.created_at),
                    record.updated_at.as_ref().map(format_datetime),
                    record.source,
                ],
            )?;
            Ok(())
        })
    }

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id.as_str()],
                |row| row_to_record(row),
            )
            .optional()
        })
    }

    async fn get_all(&self) -> Result<Vec<MemoryRecord>> {
        self.load_all(false)
    }

    async fn delete(&self, id: &MemoryId) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM memories WHERE id = ?1", params![id.as_str()])?;
            Ok(rows > 0)
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM memories", [])?;
            Ok(())
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteStorage {
    async fn nearest(&self, embedding: &[f32], limit: usize) -> Result<Vec<MemoryRecord>> {
        let candidates = self.load_all(true)?;
        debug!(candidates = candidates.len(), limit, "SQLite nearest-neighbour scan");

        let mut scored: Vec<(f32, MemoryRecord)> = candidates
            .into_iter()
            .filter_map(|r| {
                let score = cosine_similarity(embedding, r.embedding.as_deref()?);
                Some((score, r))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }
}
