//! Scripted clients for unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::llm::{EmbeddingClient, GenerateOptions, GenerationClient};

/// Generation client that answers from a rule table.
///
/// The first rule whose needle occurs in the prompt wins; otherwise the
/// default response is returned. Every prompt is recorded.
#[derive(Default)]
pub(crate) struct MockGenerator {
    rules: Vec<(String, String)>,
    default_response: String,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Number of recorded prompts containing `needle`.
    pub fn calls_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl GenerationClient for MockGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::Generation("scripted failure".to_string()));
        }

        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Embedding client mapping keywords to fixed vectors.
///
/// The first registered keyword contained in the lower-cased text decides
/// the vector; otherwise the default vector is returned.
pub(crate) struct StaticEmbedder {
    rules: Vec<(String, Vec<f32>)>,
    default_vector: Vec<f32>,
    fail: bool,
    calls: Mutex<usize>,
}

impl StaticEmbedder {
    pub fn new(default_vector: Vec<f32>) -> Self {
        Self {
            rules: Vec::new(),
            default_vector,
            fail: false,
            calls: Mutex::new(0),
        }
    }

    /// An embedder whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with(mut self, keyword: impl Into<String>, vector: Vec<f32>) -> Self {
        self.rules.push((keyword.into().to_lowercase(), vector));
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl EmbeddingClient for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(Error::Embedding("scripted failure".to_string()));
        }

        let lowered = text.to_lowercase();
        Ok(self
            .rules
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword.as_str()))
            .map(|(_, vector)| vector.clone())
            .unwrap_or_else(|| self.default_vector.clone()))
    }
}
