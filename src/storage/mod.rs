//! Durable storage port and the adapters that ship with the crate.
//!
//! - [`InMemoryStorage`]: process-local map, insertion ordered
//! - [`SqliteStorage`]: SQLite file or in-memory database, also a [`VectorIndex`]

mod memory;
mod schema;
mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::{MemoryId, MemoryRecord};

pub use memory::InMemoryStorage;
pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;

/// Storage port consumed by the memory core.
///
/// `save` is an upsert keyed by record id. Adapters must not persist the
/// transient `relevance` field.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn save(&self, record: &MemoryRecord) -> Result<()>;

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>>;

    async fn get_all(&self) -> Result<Vec<MemoryRecord>>;

    /// Returns whether a record existed.
    async fn delete(&self, id: &MemoryId) -> Result<bool>;

    async fn clear(&self) -> Result<()>;
}

/// Nearest-neighbour search offered by stores that index embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Records closest to `embedding`, most similar first.
    async fn nearest(&self, embedding: &[f32], limit: usize) -> Result<Vec<MemoryRecord>>;
}
