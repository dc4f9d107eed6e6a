//! Bounded, recency-ordered working cache in front of durable storage.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::memory::{MemoryId, MemoryRecord};
use crate::storage::StorageAdapter;

/// Default number of records held.
pub const DEFAULT_CAPACITY: usize = 10;

/// Front-to-back recency list of at most `capacity` records.
///
/// Re-activating a cached record moves it to the front. When the list
/// overflows, the tail is evicted and written back to storage with a
/// `lastAccessed` timestamp; records already forgotten are not resurrected.
pub struct WorkingMemory {
    capacity: usize,
    entries: Mutex<VecDeque<MemoryRecord>>,
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
}

impl WorkingMemory {
    pub fn new(capacity: usize, storage: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            storage,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: &MemoryId) -> bool {
        self.entries.lock().await.iter().any(|r| &r.id == id)
    }

    /// Push `record` to the front, returning the evicted record if any.
    pub async fn activate(&self, record: MemoryRecord) -> Result<Option<MemoryRecord>> {
        let evicted = {
            let mut entries = self.entries.lock().await;
            entries.retain(|r| r.id != record.id);
            entries.push_front(record);
            if entries.len() > self.capacity {
                entries.pop_back()
            } else {
                None
            }
        };

        if let Some(evicted) = &evicted {
            self.write_back(evicted).await?;
        }
        Ok(evicted)
    }

    async fn write_back(&self, evicted: &MemoryRecord) -> Result<()> {
        let Some(mut stored) = self.storage.get(&evicted.id).await? else {
            debug!(id = %evicted.id, "Evicted record no longer stored; skipping write-back");
            return Ok(());
        };
        stored.metadata.set_last_accessed(self.clock.now());
        self.storage.save(&stored).await?;
        debug!(id = %evicted.id, "Evicted from working memory");
        Ok(())
    }

    /// Drop `id` from the cache without writing it back.
    pub async fn remove(&self, id: &MemoryId) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|r| &r.id != id);
        entries.len() != before
    }

    /// Empty the cache without writing anything back.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Case-insensitive substring search over the cache, falling back to a
    /// full storage scan when nothing cached matches.
    pub async fn recall(&self, query: &str) -> Result<Vec<MemoryRecord>> {
        let needle = query.to_lowercase();
        let matches = |r: &MemoryRecord| r.content.to_lowercase().contains(&needle);

        let hot: Vec<MemoryRecord> = {
            let entries = self.entries.lock().await;
            entries.iter().filter(|r| matches(*r)).cloned().collect()
        };
        if !hot.is_empty() {
            debug!(count = hot.len(), "Working memory hit");
            return Ok(hot);
        }

        let cold: Vec<MemoryRecord> = self
            .storage
            .get_all()
            .await?
            .into_iter()
            .filter(|r| matches(r))
            .collect();
        debug!(count = cold.len(), "Working memory miss; scanned storage");
        Ok(cold)
    }

    /// Cached records, most recently activated first.
    pub async fn context(&self) -> Vec<MemoryRecord> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryKind;
    use crate::storage::InMemoryStorage;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        ))
    }

    async fn stored(storage: &InMemoryStorage, content: &str) -> MemoryRecord {
        let record = MemoryRecord::new(MemoryKind::Fact, content, Utc::now());
        storage.save(&record).await.unwrap();
        record
    }

    fn contents(records: &[MemoryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_overflow_evicts_tail_and_writes_back() {
        let storage = Arc::new(InMemoryStorage::new());
        let clock = clock();
        let cache = WorkingMemory::new(2, storage.clone(), clock.clone());

        let a = stored(&storage, "a").await;
        let b = stored(&storage, "b").await;
        let c = stored(&storage, "c").await;

        assert!(cache.activate(a.clone()).await.unwrap().is_none());
        assert!(cache.activate(b).await.unwrap().is_none());
        let evicted = cache.activate(c).await.unwrap().unwrap();

        assert_eq!(evicted.id, a.id);
        assert_eq!(contents(&cache.context().await), vec!["c", "b"]);

        let written = storage.get(&a.id).await.unwrap().unwrap();
        assert_eq!(written.metadata.last_accessed(), Some(clock.now()));
    }

    #[tokio::test]
    async fn test_reactivation_moves_to_front() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = WorkingMemory::new(2, storage.clone(), clock());

        let a = stored(&storage, "a").await;
        let b = stored(&storage, "b").await;
        cache.activate(a.clone()).await.unwrap();
        cache.activate(b.clone()).await.unwrap();
        assert!(cache.activate(a).await.unwrap().is_none());

        assert_eq!(contents(&cache.context().await), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_forgotten_record_not_resurrected() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = WorkingMemory::new(1, storage.clone(), clock());

        let a = stored(&storage, "a").await;
        let b = stored(&storage, "b").await;
        cache.activate(a.clone()).await.unwrap();
        storage.delete(&a.id).await.unwrap();

        cache.activate(b).await.unwrap();
        assert!(storage.get(&a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recall_prefers_cache() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = WorkingMemory::new(5, storage.clone(), clock());

        let hot = stored(&storage, "Meeting with Alice").await;
        stored(&storage, "meeting notes archive").await;
        stored(&storage, "Lunch order").await;
        cache.activate(hot).await.unwrap();

        let hits = cache.recall("MEETING").await.unwrap();
        assert_eq!(contents(&hits), vec!["Meeting with Alice"]);

        let cold = cache.recall("lunch").await.unwrap();
        assert_eq!(contents(&cold), vec!["Lunch order"]);

        assert!(cache.recall("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = WorkingMemory::new(3, storage.clone(), clock());
        let a = stored(&storage, "a").await;
        cache.activate(a.clone()).await.unwrap();

        assert!(cache.remove(&a.id).await);
        assert!(!cache.remove(&a.id).await);
        assert!(cache.is_empty().await);
    }

    proptest! {
        /// The cache never holds more than its capacity, and each overflow
        /// evicts exactly one record.
        #[test]
        fn size_never_exceeds_capacity(capacity in 1usize..6, picks in prop::collection::vec(0usize..10, 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let storage = Arc::new(InMemoryStorage::new());
                let cache = WorkingMemory::new(capacity, storage.clone(), clock());
                let mut pool = Vec::new();
                for i in 0..10 {
                    pool.push(stored(&storage, &format!("r{}", i)).await);
                }

                for pick in picks {
                    let before = cache.len().await;
                    let was_cached = cache.contains(&pool[pick].id).await;
                    let evicted = cache.activate(pool[pick].clone()).await.unwrap();
                    let after = cache.len().await;

                    assert!(after <= capacity);
                    if !was_cached && before == capacity {
                        assert!(evicted.is_some());
                        assert_eq!(after, capacity);
                    } else {
                        assert!(evicted.is_none());
                    }
                }
            });
        }
    }
}
