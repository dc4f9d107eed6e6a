//! In-memory storage adapter.
//!
//! Provides async CRUD for `MemoryRecord`s using `tokio::sync::RwLock`.
//! `get_all` returns records in first-insertion order; re-saving an existing
//! id replaces it in place.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::memory::{MemoryId, MemoryRecord};

use super::StorageAdapter;

#[derive(Default)]
struct Inner {
    records: BTreeMap<u64, MemoryRecord>,
    positions: HashMap<MemoryId, u64>,
    next_seq: u64,
}

/// Process-local store.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        let mut stored = record.clone();
        stored.relevance = None;

        let mut inner = self.inner.write().await;
        let seq = match inner.positions.get(&stored.id) {
            Some(seq) => *seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.positions.insert(stored.id.clone(), seq);
                seq
            }
        };
        inner.records.insert(seq, stored);
        Ok(())
    }

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .positions
            .get(id)
            .and_then(|seq| inner.records.get(seq))
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<MemoryRecord>> {
        Ok(self.inner.read().await.records.values().cloned().collect())
    }

    async fn delete(&self, id: &MemoryId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.positions.remove(id) {
            Some(seq) => {
                inner.records.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.records.clear();
        inner.positions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(content: &str) -> MemoryRecord {
        MemoryRecord::new(MemoryKind::Fact, content, Utc::now())
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = InMemoryStorage::new();
        let r = record("User likes pizza").with_metadata("source", "chat");

        store.save(&r).await.unwrap();
        let back = store.get(&r.id).await.unwrap().unwrap();
        assert_eq!(back, r);
    }

    #[tokio::test]
    async fn test_relevance_not_stored() {
        let store = InMemoryStorage::new();
        let mut r = record("decayed");
        r.relevance = Some(0.3);

        store.save(&r).await.unwrap();
        let back = store.get(&r.id).await.unwrap().unwrap();
        assert_eq!(back.relevance, None);
    }

    #[tokio::test]
    async fn test_insertion_order_and_upsert() {
        let store = InMemoryStorage::new();
        let a = record("a");
        let b = record("b");
        let c = record("c");
        for r in [&a, &b, &c] {
            store.save(r).await.unwrap();
        }

        let mut b2 = b.clone();
        b2.content = "b updated".to_string();
        store.save(&b2).await.unwrap();

        let all: Vec<String> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(all, vec!["a", "b updated", "c"]);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = InMemoryStorage::new();
        let a = record("a");
        store.save(&a).await.unwrap();
        store.save(&record("b")).await.unwrap();

        assert!(store.delete(&a.id).await.unwrap());
        assert!(!store.delete(&a.id).await.unwrap());
        assert!(store.get(&a.id).await.unwrap().is_none());
        assert_eq!(store.len().await, 1);

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
