//! Error types for the Diligence research agent.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, model services, retrieval,
//! prompts and workflow control.

use thiserror::Error;

/// Unified error type for the Diligence research agent.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Malformed model output is never represented here: components that consume
/// generated text substitute their documented defaults instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation or embedding service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// The remote service rejected the call because of rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The remote service did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Vector index, lexical index and scoring errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Workflow controller errors
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error belongs to the transient-service class
    /// (rate limit, timeout) and may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::RateLimited(_) | AppError::Timeout(_))
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
