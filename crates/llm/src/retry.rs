//! Exponential backoff for rate-limited model services.
//!
//! Only transient errors (rate limit, timeout) are retried. Everything else is
//! returned on the first failure, and the last transient error is returned
//! once the attempt budget is spent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use diligence_core::config::RetrySettings;
use diligence_core::AppResult;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{LlmClient, LlmRequest, LlmResponse};

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget is spent.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match operation().await {
                Ok(v) => {
                    if attempts > 1 {
                        info!("Operation succeeded after {} attempts", attempts);
                    }
                    return Ok(v);
                }
                Err(e) if !e.is_transient() => {
                    debug!("Error is non-retryable, stopping: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    if attempts >= self.max_attempts {
                        warn!(
                            "Operation failed after {} attempts, giving up: {}",
                            attempts, e
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempts);
                    warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempts, self.max_attempts, delay, e
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Decorator applying a [`RetryPolicy`] to every completion.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl LlmClient for RetryingClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.policy
            .execute(|| self.inner.complete(request))
            .await
    }
}
