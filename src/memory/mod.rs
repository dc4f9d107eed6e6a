//! Memory records and the store/recall core.
//!
//! [`MemoryManager`] owns the base contract: `remember`, `recall`,
//! `summarize`, `forget`, `inspect`, `clear`, with optional time decay applied
//! at recall. Everything else in the crate builds on it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mnemo_core::memory::{MemoryInput, MemoryManager};
//! use mnemo_core::retrieval::KeywordStrategy;
//! use mnemo_core::storage::InMemoryStorage;
//!
//! let manager = MemoryManager::new(Arc::new(InMemoryStorage::new()))
//!     .with_strategy(Arc::new(KeywordStrategy));
//!
//! manager.remember(MemoryInput::preference("User prefers dark mode")).await?;
//! let hits = manager.recall("dark mode", Some(5)).await?;
//! ```

mod manager;
mod types;

pub use manager::{MemoryManager, NOTHING_TO_SUMMARIZE};
pub use types::{MemoryId, MemoryInput, MemoryKind, MemoryRecord, Metadata, SummaryScope};
