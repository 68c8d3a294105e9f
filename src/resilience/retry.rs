//! Retry with exponential backoff.
//!
//! Only transient failures are retried; see
//! [`SvalinnError::is_retryable`](crate::SvalinnError::is_retryable).
//! When a provider supplies a `Retry-After` hint, the wait honors it if
//! it exceeds the computed backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{Result, SvalinnError};

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first call. Default: 3.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles each retry. Default: 1 s.
    pub base_delay: Duration,
    /// Upper bound on any single backoff. Default: 30 s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total number of attempts (including the first call).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the backoff before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the upper bound on any single backoff.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

/// Retry executor for one provider.
pub struct Retry {
    provider: String,
    config: RetryConfig,
}

impl Retry {
    /// Create a retry policy for the given provider.
    pub fn new(provider: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
        }
    }

    /// Backoff before the retry that follows attempt `attempt`
    /// (1-based): `base * 2^(attempt - 1)`, capped at the configured
    /// maximum.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let backoff = self
            .config
            .base_delay
            .saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX));
        backoff.min(self.config.max_delay)
    }

    /// The wait actually slept: the computed backoff, stretched to a
    /// provider-supplied `Retry-After` hint when that is longer.
    fn effective_delay(&self, attempt: u32, error: &SvalinnError) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match error.retry_after() {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }

    /// Run `operation` with retries.
    ///
    /// The closure receives the 1-based attempt number. A non-retryable
    /// error returns immediately; otherwise the last error is returned
    /// once the attempt budget is spent.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = self.effective_delay(attempt, &err);
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "provider" => self.provider.clone(),
                        "error" => err.kind(),
                    )
                    .increment(1);
                    warn!(
                        provider = %self.provider,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
