//! Generation provider implementations.

pub mod mock;
pub mod ollama;
pub mod openai;

pub use mock::{MockLlmClient, MockReply};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use diligence_core::AppError;
use reqwest::StatusCode;

/// Map a failed HTTP send onto the error taxonomy.
pub fn send_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("{} request timed out: {}", provider, err))
    } else {
        AppError::Llm(format!("Failed to send request to {}: {}", provider, err))
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub fn status_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            AppError::RateLimited(format!("{} API ({}): {}", provider, status, body))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AppError::Timeout(format!("{} API ({}): {}", provider, status, body))
        }
        _ => AppError::Llm(format!("{} API error ({}): {}", provider, status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error("ollama", StatusCode::TOO_MANY_REQUESTS, "slow down"),
            AppError::RateLimited(_)
        ));
        assert!(matches!(
            status_error("openai", StatusCode::GATEWAY_TIMEOUT, ""),
            AppError::Timeout(_)
        ));
        assert!(matches!(
            status_error("openai", StatusCode::BAD_REQUEST, "bad"),
            AppError::Llm(_)
        ));
    }
}
