//! Completion client for the external text-completion service
//!
//! The [`CompletionService`] trait is the transport seam: one request, one
//! attempt. [`CompletionClient`] wraps a service with a per-attempt timeout
//! and exponential backoff, and is the only thing the reasoning stages talk to.

mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::CompletionConfig;
use crate::{Error, Result};

pub use openai::OpenAiService;

/// Failure of a single completion attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The attempt exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// The service refused the request because of rate limiting
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The service returned a 5xx-class error
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The request never reached the service
    #[error("network error: {0}")]
    Network(String),

    /// The service answered but the body could not be used
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Credentials were missing or rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service rejected the request itself
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CompletionError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::Timeout
                | CompletionError::RateLimited(_)
                | CompletionError::Server { .. }
                | CompletionError::Network(_)
                | CompletionError::Malformed(_)
        )
    }

    /// Map an HTTP status and body to an error kind
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => CompletionError::Auth(body.to_string()),
            408 => CompletionError::Timeout,
            429 => CompletionError::RateLimited(body.to_string()),
            500..=599 => CompletionError::Server {
                status,
                message: body.to_string(),
            },
            _ => CompletionError::InvalidRequest(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// A single request to the completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instructions framing the model's role
    pub system: String,
    /// The user prompt
    pub prompt: String,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Text returned by the completion service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// The completion text, trimmed
    pub text: String,
    /// Total tokens billed for the request (0 if the service did not say)
    pub tokens_used: u64,
}

impl Completion {
    /// Create a completion with no usage information
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_used: 0,
        }
    }

    /// Attach token usage
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = tokens;
        self
    }
}

/// Transport for the external text-completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Get the name of this service
    fn name(&self) -> &'static str;

    /// Issue exactly one request
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, CompletionError>;
}

/// Retry and timeout settings for completion calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further failure
    pub base_delay: Duration,
    /// Timeout applied to each attempt independently
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default delays
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the base backoff delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay to wait after `attempt` (1-based) has failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&CompletionConfig> for RetryPolicy {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            timeout: config.timeout,
        }
    }
}

/// Retrying client around a [`CompletionService`]
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
    policy: RetryPolicy,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("service", &self.service.name())
            .field("policy", &self.policy)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl CompletionClient {
    /// Create a client with the default retry policy
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Create a client from configuration
    pub fn from_config(service: Arc<dyn CompletionService>, config: &CompletionConfig) -> Self {
        Self::new(service)
            .with_policy(RetryPolicy::from(config))
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
    }

    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the token limit sent with every request
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature sent with every request
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Get the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Complete a prompt using the policy's attempt budget
    pub async fn complete(&self, prompt: &str, system: &str) -> Result<Completion> {
        self.complete_with_attempts(prompt, system, self.policy.max_attempts)
            .await
    }

    /// Complete a prompt, retrying transient failures up to `max_attempts` times
    ///
    /// Fails with [`Error::CompletionUnavailable`] carrying the last underlying
    /// error once the budget is spent or a permanent error is returned.
    pub async fn complete_with_attempts(
        &self,
        prompt: &str,
        system: &str,
        max_attempts: u32,
    ) -> Result<Completion> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        let max_attempts = max_attempts.max(1);
        let request = CompletionRequest {
            system: system.to_string(),
            prompt: prompt.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome =
                match tokio::time::timeout(self.policy.timeout, self.service.complete(&request))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CompletionError::Timeout),
                };

            match outcome {
                Ok(completion) => {
                    debug!(
                        service = self.service.name(),
                        attempt,
                        tokens = completion.tokens_used,
                        "Completion succeeded"
                    );
                    return Ok(completion);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        service = self.service.name(),
                        attempt,
                        max_attempts,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Completion attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        service = self.service.name(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "Completion service unavailable"
                    );
                    return Err(Error::CompletionUnavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
