//! Similarity-gated contradiction detection and resolution.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::llm::{EmbeddingClient, GenerateOptions, GenerationClient};
use crate::memory::MemoryRecord;
use crate::retrieval::cosine_similarity;

/// How a contradiction between a new and an existing record is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The new record supersedes the old one
    KeepNew,
    /// The old record stands; the new one is discarded
    KeepOld,
    /// Both hold partial truth
    Merge,
}

impl Resolution {
    /// Read a resolution from a model reply. Anything unrecognized is `Merge`.
    pub fn from_response(response: &str) -> Self {
        let upper = response.to_uppercase();
        if upper.contains("KEEP_NEW") {
            Self::KeepNew
        } else if upper.contains("KEEP_OLD") {
            Self::KeepOld
        } else {
            Self::Merge
        }
    }
}

/// An existing record judged to contradict the new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub existing: MemoryRecord,
    pub similarity: f32,
}

/// Asks the generation client about record pairs that are similar enough to
/// plausibly conflict.
pub struct ContradictionDetector {
    generator: Arc<dyn GenerationClient>,
    embedder: Arc<dyn EmbeddingClient>,
    threshold: f32,
}

impl ContradictionDetector {
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        embedder: Arc<dyn EmbeddingClient>,
        threshold: f32,
    ) -> Self {
        Self {
            generator,
            embedder,
            threshold,
        }
    }

    /// Give `record` an embedding if it lacks one. Returns whether it has one
    /// afterwards; embedding failures are logged, not raised.
    pub async fn ensure_embedding(&self, record: &mut MemoryRecord) -> bool {
        if record.embedding.is_some() {
            return true;
        }
        match self.embedder.embed(&record.content).await {
            Ok(embedding) => {
                record.embedding = Some(embedding);
                true
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "Cannot embed record for contradiction check");
                false
            }
        }
    }

    /// First existing record above the similarity gate that the model says
    /// contradicts `record`.
    ///
    /// Candidates lacking embeddings are embedded on the fly; those
    /// embeddings are not stored.
    pub async fn find_first(
        &self,
        record: &MemoryRecord,
        existing: &[MemoryRecord],
    ) -> Result<Option<Contradiction>> {
        let Some(embedding) = record.embedding.as_deref() else {
            return Ok(None);
        };

        for candidate in existing.iter().filter(|c| c.id != record.id) {
            let similarity = match candidate.embedding.as_deref() {
                Some(other) => cosine_similarity(embedding, other),
                None => match self.embedder.embed(&candidate.content).await {
                    Ok(other) => cosine_similarity(embedding, &other),
                    Err(e) => {
                        warn!(id = %candidate.id, error = %e, "Skipping unembeddable candidate");
                        continue;
                    }
                },
            };

            if similarity <= self.threshold {
                continue;
            }

            debug!(id = %candidate.id, similarity, "Checking candidate for contradiction");
            if self.contradicts(record, candidate).await? {
                info!(new = %record.id, existing = %candidate.id, "Contradiction detected");
                return Ok(Some(Contradiction {
                    existing: candidate.clone(),
                    similarity,
                }));
            }
        }

        Ok(None)
    }

    /// Yes/no judgment. Replies that do not start with "yes" count as no.
    async fn contradicts(&self, a: &MemoryRecord, b: &MemoryRecord) -> Result<bool> {
        let prompt = format!(
            "Do these two statements contradict each other?\n\n\
             Statement 1: {}\n\
             Statement 2: {}\n\n\
             Answer with YES or NO, then briefly explain.",
            a.content, b.content
        );
        let response = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;
        Ok(response.trim_start().to_lowercase().starts_with("yes"))
    }

    /// Ask which of two contradicting records should stand.
    pub async fn resolve(&self, new: &MemoryRecord, old: &MemoryRecord) -> Result<Resolution> {
        let prompt = format!(
            "Two contradicting memories:\n\n\
             OLD: {} (from {})\n\
             NEW: {} (from {})\n\n\
             What should we do?\n\
             - KEEP_NEW: The new information supersedes the old\n\
             - KEEP_OLD: The old information is still correct\n\
             - MERGE: Both contain partial truth\n\n\
             Answer with one word: KEEP_NEW, KEEP_OLD, or MERGE",
            old.content,
            old.created_at.to_rfc3339(),
            new.content,
            new.created_at.to_rfc3339()
        );
        let response = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;
        let resolution = Resolution::from_response(&response);
        debug!(?resolution, "Contradiction resolution");
        Ok(resolution)
    }
}
