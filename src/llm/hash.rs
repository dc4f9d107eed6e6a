//! Deterministic, offline embedding provider.
//!
//! Produces a fixed-dimension vector seeded from a SHA-256 digest of the text.
//! Identical texts always embed identically; different texts are effectively
//! uncorrelated. Useful for tests and for running without an embedding API.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::client::EmbeddingClient;

/// Default vector width, matching `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Hash-seeded embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn seed(text: &str) -> f64 {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        u32::from_le_bytes(bytes) as f64
    }

    /// Synchronous embedding, exposed for callers outside an async context.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let seed = Self::seed(text);
        (0..self.dimension)
            .map(|i| ((seed + i as f64).sin() * 0.5 + 0.5) as f32)
            .collect()
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dimension() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("hello").await.unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
    }

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        let c = embedder.embed("other text").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_batch() {
        let embedder = HashEmbedder::new(8);
        let texts = vec!["one".to_string(), "two".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_sync("one"));
    }
}
