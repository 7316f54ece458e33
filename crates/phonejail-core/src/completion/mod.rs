//! Text-completion collaborator and its retry loop.

mod openai;

pub use openai::{keyring_store, OpenAiCompletion};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::storage::CompletionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("unauthorized access to completion service")]
    Unauthorized,

    #[error("completion service rate limit exceeded")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response from completion service: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::RateLimited | CompletionError::Network(_))
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; later attempts wait proportionally longer.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// Call `service`, retrying transient failures within the policy budget.
pub async fn complete_with_retry(
    service: &dyn CompletionService,
    policy: RetryPolicy,
    prompt: &str,
    temperature: f32,
    max_tokens: u32,
) -> Result<String, CompletionError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match service.complete(prompt, temperature, max_tokens).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %e, "completion failed, retrying");
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
