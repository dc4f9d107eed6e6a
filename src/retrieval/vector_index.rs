//! Ranking delegated to a store-side nearest-neighbour index.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::llm::EmbeddingClient;
use crate::memory::MemoryRecord;
use crate::storage::VectorIndex;

use super::{RetrievalStrategy, DEFAULT_LIMIT};

/// Embeds the query and asks a [`VectorIndex`] for the closest records.
///
/// The candidate list handed in by the caller is ignored; results come
/// straight from the index.
#[derive(Clone)]
pub struct RemoteIndexStrategy {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl RemoteIndexStrategy {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { index, embedder }
    }
}

#[async_trait]
impl RetrievalStrategy for RemoteIndexStrategy {
    fn name(&self) -> &'static str {
        "remote_index"
    }

    async fn retrieve(
        &self,
        query: &str,
        candidates: Vec<MemoryRecord>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        debug!(ignored = candidates.len(), limit, "Querying vector index");

        let query_embedding = self.embedder.embed(query).await?;
        let mut hits = self.index.nearest(&query_embedding, limit).await?;
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;
    use crate::storage::{SqliteStorage, StorageAdapter};
    use crate::test_support::StaticEmbedder;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_ignores_supplied_candidates() {
        let store = Arc::new(SqliteStorage::in_memory().unwrap());
        let indexed = MemoryRecord::new(MemoryKind::Fact, "Indexed tea fact", Utc::now())
            .with_embedding(vec![1.0, 0.0]);
        let other = MemoryRecord::new(MemoryKind::Fact, "Indexed coffee fact", Utc::now())
            .with_embedding(vec![0.0, 1.0]);
        store.save(&other).await.unwrap();
        store.save(&indexed).await.unwrap();

        let strategy = RemoteIndexStrategy::new(
            store.clone(),
            Arc::new(StaticEmbedder::new(vec![1.0, 0.1])),
        );
        let outsider = MemoryRecord::new(MemoryKind::Fact, "Not in the index", Utc::now())
            .with_embedding(vec![1.0, 0.0]);

        let hits = strategy
            .retrieve("tea", vec![outsider], Some(1))
            .await
            .unwrap();
        let contents: Vec<&str> = hits.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["Indexed tea fact"]);
    }
}
