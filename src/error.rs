//! Error types for mnemo-core.

use thiserror::Error;

/// Result type alias using mnemo-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memory operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An operation needs a port or option that is not configured
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage adapter failure
    #[error("Memory storage error: {0}")]
    Storage(String),

    /// Embedding provider failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Text generation provider failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// Structured model output could not be parsed
    #[error("Malformed model output in {stage}: {message}")]
    MalformedOutput { stage: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a malformed-output error for a pipeline stage.
    pub fn malformed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedOutput {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
