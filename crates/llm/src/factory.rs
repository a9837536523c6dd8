//! LLM provider factory.
//!
//! Resolves a provider name from configuration into a client and wraps it in
//! the retry decorator so every caller gets backoff on rate limits.

use std::sync::Arc;

use diligence_core::{AppError, AppResult};

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::retry::{RetryPolicy, RetryingClient};

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required for "openai")
/// * `retry` - Backoff policy applied to every completion
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// secret is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    retry: RetryPolicy,
) -> AppResult<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Arc::new(OllamaClient::with_base_url(base_url))
        }
        "openai" => {
            let key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            match endpoint {
                Some(url) => Arc::new(OpenAiClient::with_base_url(url, key)),
                None => Arc::new(OpenAiClient::new(key)),
            }
        }
        _ => {
            return Err(AppError::Config(format!("Unknown provider: {}", provider)));
        }
    };

    tracing::debug!(provider, ?endpoint, max_attempts = retry.max_attempts, "Created LLM client");

    Ok(Arc::new(RetryingClient::new(client, retry)))
}
