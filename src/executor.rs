//! Resilient execution pipeline around one provider client.
//!
//! Request flow:
//!
//! 1. validate input, check the shared response cache (hit returns
//!    immediately, bypassing every guard)
//! 2. rate limiter admission
//! 3. bulkhead admission
//! 4. circuit breaker permission
//! 5. provider call with retry (optionally deadline-bounded)
//! 6. success: record with the breaker, cache, return
//! 7. terminal failure: serve a pattern-matched fallback response
//!
//! The circuit breaker sees one outcome per logical call, not one per
//! retry attempt, and admission rejections never reach it. Fallback
//! responses are never cached.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::cache::{Fingerprint, ResponseCache};
use crate::providers::ProviderClient;
use crate::resilience::{
    Bulkhead, CircuitBreaker, CircuitState, FallbackGenerator, RateLimiter, ResilienceConfig,
    Retry,
};
use crate::telemetry;
use crate::types::{LlmResponse, SendOptions};
use crate::{Result, SvalinnError};

/// One provider client wrapped in the full resilience pipeline.
///
/// All guard state (rate limiter window, bulkhead permits, circuit
/// window) is private to this executor, so providers degrade
/// independently. The response cache is shared across executors;
/// entries are still per-provider because the provider id is part of
/// the cache key.
pub struct ResilientExecutor {
    provider: String,
    client: Arc<dyn ProviderClient>,
    cache: Arc<ResponseCache>,
    rate_limiter: RateLimiter,
    bulkhead: Bulkhead,
    circuit: CircuitBreaker,
    retry: Retry,
    fallback: FallbackGenerator,
}

impl ResilientExecutor {
    /// Wrap a provider client with fresh guard state.
    pub fn new(
        client: Arc<dyn ProviderClient>,
        cache: Arc<ResponseCache>,
        config: &ResilienceConfig,
    ) -> Self {
        let provider = client.provider_id().to_owned();
        Self {
            rate_limiter: RateLimiter::new(&provider, config.rate_limiter.clone()),
            bulkhead: Bulkhead::new(&provider, config.bulkhead.clone()),
            circuit: CircuitBreaker::new(&provider, config.circuit_breaker.clone()),
            retry: Retry::new(&provider, config.retry.clone()),
            fallback: FallbackGenerator::new(),
            provider,
            client,
            cache,
        }
    }

    /// Execute one request through the pipeline.
    ///
    /// Total after validation: terminal failures are answered by the
    /// fallback generator, so the only errors callers see are
    /// [`SvalinnError::InvalidInput`] for an empty prompt or model.
    pub async fn send(&self, prompt: &str, options: &SendOptions) -> Result<LlmResponse> {
        if prompt.trim().is_empty() {
            return Err(SvalinnError::InvalidInput("prompt must not be empty".into()));
        }
        if options.model.trim().is_empty() {
            return Err(SvalinnError::InvalidInput("model must not be empty".into()));
        }

        let fingerprint = Fingerprint::compute(&self.provider, &options.model, prompt);
        if let Some(hit) = self.cache.get(&fingerprint, &self.provider) {
            return Ok(hit);
        }

        let start = Instant::now();
        let result = self.execute_guarded(prompt, options).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => self.provider.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => self.provider.clone(),
        )
        .record(start.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                debug!(
                    provider = %self.provider,
                    latency_ms = response.latency(),
                    tokens = response.tokens(),
                    "request succeeded"
                );
                self.cache.put(fingerprint, &response);
                Ok(response)
            }
            Err(err) => {
                metrics::counter!(telemetry::FALLBACKS_TOTAL,
                    "provider" => self.provider.clone(),
                    "reason" => err.kind(),
                )
                .increment(1);
                error!(
                    provider = %self.provider,
                    error = %err,
                    "request failed terminally, serving fallback"
                );
                Ok(self.fallback.generate(prompt, &err))
            }
        }
    }

    /// Admission guards, then the provider call with retry.
    ///
    /// The circuit breaker gates the whole retry loop and sees exactly
    /// one outcome for it, delivered through the permit; if the call is
    /// cancelled mid-flight the dropped permit hands back its probe
    /// slot.
    async fn execute_guarded(&self, prompt: &str, options: &SendOptions) -> Result<LlmResponse> {
        self.rate_limiter.acquire().await?;
        let _slot = self.bulkhead.acquire().await?;
        let permit = self.circuit.try_acquire()?;

        let result = self.call_with_retry(prompt, options).await;
        match &result {
            Ok(_) => permit.success(),
            Err(err) => permit.failure(err.counts_as_failure()),
        }
        result
    }

    async fn call_with_retry(&self, prompt: &str, options: &SendOptions) -> Result<LlmResponse> {
        let attempt = |_: u32| self.client.send(prompt, options);
        match options.call_timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.retry.execute(attempt)).await {
                    Ok(result) => result,
                    Err(_) => Err(SvalinnError::Timeout {
                        provider: self.provider.clone(),
                        elapsed: deadline,
                    }),
                }
            }
            None => self.retry.execute(attempt).await,
        }
    }

    /// The provider id this executor serves.
    pub fn provider_id(&self) -> &str {
        &self.provider
    }

    /// Healthy means the circuit breaker is not open.
    pub fn is_healthy(&self) -> bool {
        self.circuit.state() != CircuitState::Open
    }

    /// Current circuit breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }
}
