//! Error types for docqa.
//!
//! This module defines a unified error enum covering ingestion, retrieval,
//! generation, configuration and I/O failures.

use thiserror::Error;

/// Unified error type for docqa.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Nothing is retried: every variant is surfaced to the caller as-is.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller supplied unusable input (e.g. an empty document batch)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A source file could not be read or parsed
    #[error("Failed to load '{path}': {message}")]
    LoadFailure { path: String, message: String },

    /// A question was asked before anything was ingested
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A remote document could not be fetched
    #[error("Failed to download '{url}': {message}")]
    DownloadFailure { url: String, message: String },

    /// Embedding provider errors (including embedding-space mismatches)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector backend storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a load failure for a path.
    pub fn load_failure(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoadFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a download failure for a URL.
    pub fn download_failure(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailure {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::LoadFailure { .. } => "load_failure",
            Self::NotReady(_) => "not_ready",
            Self::DownloadFailure { .. } => "download_failure",
            Self::Embedding(_) => "embedding_error",
            Self::Llm(_) => "llm_error",
            Self::Prompt(_) => "prompt_error",
            Self::Config(_) => "config_error",
            Self::Storage(_) => "storage_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Other(_) => "internal_error",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
