//! Store/recall core.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::MemoryOptions;
use crate::error::{Error, Result};
use crate::llm::{EmbeddingClient, GenerateOptions, GenerationClient};
use crate::retrieval::RetrievalStrategy;
use crate::storage::StorageAdapter;

use super::types::{MemoryId, MemoryInput, MemoryRecord, SummaryScope};

/// Returned by `summarize` when no record matches the scope.
pub const NOTHING_TO_SUMMARIZE: &str = "No memories to summarize.";

/// Owns the create/read/delete/decay/summarize contract over a storage port.
///
/// Ranking is delegated to an optional [`RetrievalStrategy`]; without one,
/// `recall` returns records in storage order.
#[derive(Clone)]
pub struct MemoryManager {
    storage: Arc<dyn StorageAdapter>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    generator: Option<Arc<dyn GenerationClient>>,
    strategy: Option<Arc<dyn RetrievalStrategy>>,
    clock: Arc<dyn Clock>,
    options: MemoryOptions,
}

impl MemoryManager {
    /// Create a manager over `storage` with default options and the system clock.
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage,
            embedder: None,
            generator: None,
            strategy: None,
            clock: Arc::new(SystemClock),
            options: MemoryOptions::default(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingClient>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn RetrievalStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the options, rejecting invalid values.
    pub fn with_options(mut self, options: MemoryOptions) -> Result<Self> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn embedder(&self) -> Option<&Arc<dyn EmbeddingClient>> {
        self.embedder.as_ref()
    }

    pub fn generator(&self) -> Option<&Arc<dyn GenerationClient>> {
        self.generator.as_ref()
    }

    pub fn options(&self) -> &MemoryOptions {
        &self.options
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current time from the configured clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Embed `text` if an embedder is configured, logging and dropping failures.
    pub(crate) async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "Failed to generate embedding");
                None
            }
        }
    }

    /// Store a new record.
    ///
    /// Embedding failures are logged and the record is stored without one.
    #[instrument(skip(self, input), fields(kind = %input.kind))]
    pub async fn remember(&self, input: MemoryInput) -> Result<MemoryRecord> {
        debug!("Remembering new record");

        let mut record = MemoryRecord::new(input.kind, input.content, self.clock.now());
        record.metadata = input.metadata;
        record.source = input.source;

        if self.options.auto_embed {
            record.embedding = self.try_embed(&record.content).await;
            if record.embedding.is_some() {
                debug!(id = %record.id, "Embedding generated");
            }
        }

        self.storage.save(&record).await?;
        info!(id = %record.id, kind = %record.kind, "Memory stored");

        Ok(record)
    }

    /// Return up to `limit` records relevant to `query`.
    #[instrument(skip(self))]
    pub async fn recall(&self, query: &str, limit: Option<usize>) -> Result<Vec<MemoryRecord>> {
        let all = self.storage.get_all().await?;
        if all.is_empty() {
            info!("No memories found");
            return Ok(Vec::new());
        }

        let candidates = if self.options.enable_decay {
            self.apply_decay(all)
        } else {
            all
        };
        let limit = limit.unwrap_or(self.options.default_retrieval_limit);

        let mut recalled = match &self.strategy {
            Some(strategy) => {
                let ranked = strategy.retrieve(query, candidates, Some(limit)).await?;
                debug!(strategy = strategy.name(), "Ranked via strategy");
                ranked
            }
            None => candidates,
        };
        recalled.truncate(limit);

        info!(count = recalled.len(), "Memories recalled");
        Ok(recalled)
    }

    /// Summarize stored records through the generation client.
    #[instrument(skip(self))]
    pub async fn summarize(&self, scope: &SummaryScope) -> Result<String> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| Error::config("Generation client required for summarization"))?;

        let mut records = self.storage.get_all().await?;
        if let Some(kind) = scope.kind {
            records.retain(|r| r.kind == kind);
        }
        if let Some(limit) = scope.limit {
            records.truncate(limit);
        }

        if records.is_empty() {
            return Ok(NOTHING_TO_SUMMARIZE.to_string());
        }

        let lines: Vec<String> = records
            .iter()
            .map(|r| format!("[{}] {}", r.kind, r.content))
            .collect();
        let prompt = format!(
            "Summarize the following memories:\n\n{}\n\nProvide a concise summary:",
            lines.join("\n")
        );

        let summary = generator.generate(&prompt, &GenerateOptions::default()).await?;
        info!(count = records.len(), "Summary generated");
        Ok(summary)
    }

    /// Delete a record. Returns whether it existed.
    pub async fn forget(&self, id: &MemoryId) -> Result<bool> {
        let deleted = self.storage.delete(id).await?;
        if deleted {
            info!(id = %id, "Memory forgotten");
        } else {
            warn!(id = %id, "Memory not found for deletion");
        }
        Ok(deleted)
    }

    pub async fn inspect(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        self.storage.get(id).await
    }

    pub async fn clear(&self) -> Result<()> {
        warn!("Clearing all memories");
        self.storage.clear().await
    }

    /// Decorate records with `decay_factor ^ age_in_days` relevance.
    ///
    /// Operates on the given copies only; storage is untouched.
    pub fn apply_decay(&self, records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
        let now = self.clock.now();
        records
            .into_iter()
            .map(|mut r| {
                r.relevance = Some(self.options.decay_factor.powf(r.age_days(now)));
                r
            })
            .collect()
    }
}
