//! Capability seams for the text-generation and embedding backends.
//!
//! The planner only ever needs `complete(prompt) -> text` and
//! `embed(texts) -> vectors`; everything network- or model-specific lives
//! behind these traits so the pipeline can be driven by mocks in tests.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

use crate::api_connection::{ApiConnectionError, Provider};

#[mockall::automock]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ApiConnectionError>;
}

#[mockall::automock]
pub trait EmbeddingBackend: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding for single text: {}", text))
    }
}

#[async_trait]
impl CompletionBackend for Provider {
    async fn complete(&self, prompt: &str) -> Result<String, ApiConnectionError> {
        let response = self.call_chat_completion(self.user_request(prompt)).await?;
        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
            _ => Err(ApiConnectionError::EmptyResponse),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    /// Backoff between attempts is drawn uniformly from this range.
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(120),
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> Duration {
        if self.max_backoff <= self.min_backoff {
            return self.min_backoff;
        }
        rand::thread_rng().gen_range(self.min_backoff..self.max_backoff)
    }
}

/// Bounds every call with a timeout and retries transient failures.
pub struct RetryingBackend<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B> RetryingBackend<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<B: CompletionBackend> CompletionBackend for RetryingBackend<B> {
    async fn complete(&self, prompt: &str) -> Result<String, ApiConnectionError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.policy.timeout, self.inner.complete(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(ApiConnectionError::Timeout(self.policy.timeout)),
            };
            match outcome {
                Ok(text) => return Ok(text),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    let pause = self.policy.backoff();
                    warn!(attempt, attempts, error = %err, ?pause, "completion failed, retrying");
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
