//! Generation and embedding ports, plus the OpenAI-compatible HTTP adapter.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::GenerateOptions;

/// Text generation port.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for a single user prompt.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;
}

/// Embedding port.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts concurrently, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        try_join_all(texts.iter().map(|text| self.embed(text))).await
    }
}

/// Configuration for HTTP clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default chat model
    pub default_model: Option<String>,
    /// Default embedding model
    pub embedding_model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: None,
            embedding_model: None,
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Some sandboxed macOS environments can panic during proxy auto-detection
    // in reqwest's default client builder. Fall back to no-proxy in that case.
    match catch_unwind(AssertUnwindSafe(|| {
        Client::builder().timeout(timeout).build()
    })) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e))),
    }
}

/// OpenAI-compatible client serving both generation and embeddings.
pub struct OpenAIClient {
    config: ClientConfig,
    http: Client,
}

impl OpenAIClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    const DEFAULT_EMBEDDING_MODEL: &'static str = "text-embedding-3-small";
    const DEFAULT_TEMPERATURE: f64 = 0.7;
    const DEFAULT_MAX_TOKENS: u32 = 500;

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    fn embedding_model(&self) -> String {
        self.config
            .embedding_model
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_EMBEDDING_MODEL.to_string())
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> std::result::Result<String, String> {
        let url = format!("{}/{}", self.base_url(), path);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {}", e))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OpenAIError>(&text) {
                return Err(format!("OpenAI API error: {}", error.error.message));
            }
            return Err(format!("OpenAI API error ({}): {}", status, text));
        }

        Ok(text)
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: String,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl GenerationClient for OpenAIClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let model = options
            .model
            .clone()
            .or(self.config.default_model.clone())
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());

        let api_request = OpenAIRequest {
            model,
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: options.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS),
            temperature: options.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE),
        };

        let body = self
            .post_json("chat/completions", &api_request)
            .await
            .map_err(Error::Generation)?;

        let api_response: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Generation(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &api_response.usage {
            debug!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "OpenAI completion"
            );
        }

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Generation("No choices in response".to_string()))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_request = OpenAIEmbeddingRequest {
            model: self.embedding_model(),
            input: texts,
        };

        let body = self
            .post_json("embeddings", &api_request)
            .await
            .map_err(Error::Embedding)?;

        let api_response: OpenAIEmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if api_response.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                api_response.data.len()
            )));
        }

        Ok(api_response.data.into_iter().map(|d| d.embedding).collect())
    }
}
