//! Generation and embedding ports.
//!
//! The memory core never talks to a model provider directly; it goes through
//! the [`GenerationClient`] and [`EmbeddingClient`] traits. Two implementations
//! ship with the crate:
//!
//! - [`OpenAIClient`]: OpenAI-compatible HTTP API, serving both ports
//! - [`HashEmbedder`]: deterministic offline embeddings
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemo_core::llm::{ClientConfig, GenerateOptions, GenerationClient, OpenAIClient};
//!
//! let client = OpenAIClient::new(ClientConfig::new("your-api-key"))?;
//! let text = client
//!     .generate("Say hello", &GenerateOptions::new().with_max_tokens(16))
//!     .await?;
//! ```

mod client;
mod hash;
mod types;

pub use client::{ClientConfig, EmbeddingClient, GenerationClient, OpenAIClient};
pub use hash::{HashEmbedder, DEFAULT_DIMENSION};
pub use types::GenerateOptions;
