//! Augmentation pipeline layered over [`MemoryManager`](crate::memory::MemoryManager).
//!
//! Every stage is optional and switched by [`FeatureFlags`](crate::config::FeatureFlags):
//!
//! - **Versioning**: per-record content history with rollback
//! - **Importance**: heuristic or model-rated score in `metadata.importance`
//! - **Contradiction**: similarity-gated model judgment and resolution
//! - **Graph**: `relates_to` edges above a similarity threshold
//! - **Hierarchy**: model-assigned category paths
//! - **Working memory**: bounded recency cache
//! - **Dual memory**: semantic facts extracted from events
//! - **Consolidation**: summaries of busy time windows
//! - **Reasoning**: inference, knowledge gaps and patterns on demand
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemo_core::{AdvancedMemoryManager, FeatureFlags, MemoryConfig, MemoryInput, MemoryManager};
//!
//! let core = MemoryManager::new(storage)
//!     .with_embedder(embedder)
//!     .with_generator(generator);
//! let config = MemoryConfig::new().with_features(FeatureFlags::all());
//! let memory = AdvancedMemoryManager::new(core, &config)?;
//!
//! let record = memory.remember(MemoryInput::fact("User lives in Berlin")).await?;
//! ```

mod consolidation;
mod contradiction;
mod episodic;
mod hierarchy;
mod importance;
mod json;
mod pipeline;
mod reasoning;
mod versioning;

pub use consolidation::{TemporalConsolidation, CONSOLIDATION_SOURCE};
pub use contradiction::{Contradiction, ContradictionDetector, Resolution};
pub use episodic::{DualMemory, Episode, KnowledgeRecall, SemanticFact, REINFORCEMENT_RATE};
pub use hierarchy::{split_path, CategoryTree, HierarchyNode, HierarchyOrganizer};
pub use importance::{
    parse_importance, HeuristicImportanceScorer, ImportanceScorer, ModelImportanceScorer,
    FALLBACK_IMPORTANCE,
};
pub use pipeline::AdvancedMemoryManager;
pub use reasoning::{Inference, MemoryReasoning};
pub use versioning::{VersionHistory, VersionSnapshot, INITIAL_REASON};
