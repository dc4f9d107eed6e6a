//! Embedding-based ranking, pure and keyword-boosted.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::llm::EmbeddingClient;
use crate::memory::MemoryRecord;

use super::keyword::{extract_keywords, keyword_score};
use super::similarity::{cosine_similarity, sort_by_score_desc};
use super::{RetrievalStrategy, DEFAULT_LIMIT};

/// Weight applied to each matched keyword in [`HybridStrategy`].
pub const KEYWORD_WEIGHT: f64 = 0.5;

/// Ranks candidates by cosine similarity to the embedded query.
///
/// Candidates without an embedding are excluded.
#[derive(Clone)]
pub struct EmbeddingStrategy {
    embedder: Arc<dyn EmbeddingClient>,
}

impl EmbeddingStrategy {
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl RetrievalStrategy for EmbeddingStrategy {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn retrieve(
        &self,
        query: &str,
        candidates: Vec<MemoryRecord>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>> {
        let query_embedding = self.embedder.embed(query).await?;
        rank(candidates, limit, |_, embedding| {
            cosine_similarity(&query_embedding, embedding) as f64
        })
    }
}

/// Cosine similarity plus [`KEYWORD_WEIGHT`] per matched query keyword.
///
/// Same exclusion rule as [`EmbeddingStrategy`].
#[derive(Clone)]
pub struct HybridStrategy {
    embedder: Arc<dyn EmbeddingClient>,
}

impl HybridStrategy {
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl RetrievalStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    async fn retrieve(
        &self,
        query: &str,
        candidates: Vec<MemoryRecord>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>> {
        let query_embedding = self.embedder.embed(query).await?;
        let keywords = extract_keywords(query);
        rank(candidates, limit, |record, embedding| {
            cosine_similarity(&query_embedding, embedding) as f64
                + KEYWORD_WEIGHT * keyword_score(&keywords, record) as f64
        })
    }
}

fn rank<F>(candidates: Vec<MemoryRecord>, limit: Option<usize>, score: F) -> Result<Vec<MemoryRecord>>
where
    F: Fn(&MemoryRecord, &[f32]) -> f64,
{
    let total = candidates.len();
    let mut scored: Vec<(f64, MemoryRecord)> = candidates
        .into_iter()
        .filter_map(|record| {
            let s = score(&record, record.embedding.as_deref()?);
            Some((s, record))
        })
        .collect();
    debug!(total, embedded = scored.len(), "Ranking embedded candidates");

    sort_by_score_desc(&mut scored);
    Ok(scored
        .into_iter()
        .take(limit.unwrap_or(DEFAULT_LIMIT))
        .map(|(_, record)| record)
        .collect())
}
