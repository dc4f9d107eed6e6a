//! Ranking strategies.
//!
//! A [`RetrievalStrategy`] takes a query and a candidate list and returns the
//! ranked subset. Variants:
//!
//! - [`KeywordStrategy`]: keyword overlap over content and metadata
//! - [`EmbeddingStrategy`]: cosine similarity to the embedded query
//! - [`HybridStrategy`]: cosine similarity plus a per-keyword bonus
//! - [`RemoteIndexStrategy`]: nearest-neighbour lookup in a [`VectorIndex`](crate::storage::VectorIndex)
//!
//! All variants sort descending by score and return at most `limit`
//! (default [`DEFAULT_LIMIT`]) records.

mod embedding;
mod keyword;
mod similarity;
mod vector_index;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::MemoryRecord;

pub use embedding::{EmbeddingStrategy, HybridStrategy, KEYWORD_WEIGHT};
pub use keyword::{extract_keywords, keyword_score, KeywordStrategy};
pub use similarity::cosine_similarity;
pub use vector_index::RemoteIndexStrategy;

/// Result count used when a caller passes no limit.
pub const DEFAULT_LIMIT: usize = 10;

/// Scores and filters a candidate set against a query.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Rank `candidates` against `query`, best first.
    async fn retrieve(
        &self,
        query: &str,
        candidates: Vec<MemoryRecord>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>>;
}
