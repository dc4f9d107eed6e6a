//! # mnemo-core
//!
//! A retrieval-augmented memory library for LLM applications: store free-form
//! records, rank them against queries, and optionally run an augmentation
//! pipeline over every insert.
//!
//! ## Core Components
//!
//! - **Memory**: [`MemoryManager`] owns store, recall, decay, summarize and delete
//! - **Retrieval**: keyword, embedding, hybrid and remote-index ranking strategies
//! - **Storage**: the [`StorageAdapter`] port with in-memory and SQLite adapters
//! - **LLM**: generation and embedding ports with an OpenAI-compatible client
//! - **Augment**: [`AdvancedMemoryManager`] and its optional pipeline stages
//! - **Graph**: typed relations between records with bounded BFS
//! - **Working**: bounded recency cache with eviction write-back
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mnemo_core::{HashEmbedder, HybridStrategy, InMemoryStorage, MemoryInput, MemoryManager};
//!
//! let embedder = Arc::new(HashEmbedder::default());
//! let memory = MemoryManager::new(Arc::new(InMemoryStorage::new()))
//!     .with_embedder(embedder.clone())
//!     .with_strategy(Arc::new(HybridStrategy::new(embedder)));
//!
//! memory.remember(MemoryInput::preference("User prefers dark mode")).await?;
//! let hits = memory.recall("dark mode", Some(5)).await?;
//! ```

pub mod analytics;
pub mod augment;
pub mod clock;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod retrieval;
pub mod storage;
pub mod working;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use analytics::{CategoryCount, MemoryAnalytics};
pub use augment::{
    AdvancedMemoryManager, CategoryTree, DualMemory, Episode, Inference, KnowledgeRecall,
    Resolution, SemanticFact, VersionSnapshot,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FeatureFlags, ImportanceScorerKind, MemoryConfig, MemoryOptions, PipelineSettings};
pub use error::{Error, Result};
pub use graph::{MemoryGraph, Relation, RelationKind};
pub use llm::{
    ClientConfig, EmbeddingClient, GenerateOptions, GenerationClient, HashEmbedder, OpenAIClient,
};
pub use memory::{
    MemoryId, MemoryInput, MemoryKind, MemoryManager, MemoryRecord, Metadata, SummaryScope,
};
pub use retrieval::{
    EmbeddingStrategy, HybridStrategy, KeywordStrategy, RemoteIndexStrategy, RetrievalStrategy,
};
pub use storage::{InMemoryStorage, SqliteStorage, StorageAdapter, VectorIndex};
pub use working::WorkingMemory;
