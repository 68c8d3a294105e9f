//! Resilience primitives for provider calls.
//!
//! Each primitive guards one failure mode and composes with the others
//! in [`executor`](crate::executor), in admission order: rate limiter,
//! then bulkhead, then circuit breaker, then retry around the provider
//! call, with [`FallbackGenerator`] catching terminal failures.

mod bulkhead;
mod circuit_breaker;
mod fallback;
mod rate_limiter;
mod retry;

pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadPermit};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitState};
pub use fallback::{FALLBACK_MODEL, FALLBACK_PROVIDER_ID, FallbackGenerator};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{Retry, RetryConfig};

/// Bundle of per-provider resilience settings.
///
/// One bundle applies to every provider registered with a gateway;
/// the executors instantiate independent state from it per provider.
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub rate_limiter: RateLimiterConfig,
    pub bulkhead: BulkheadConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

impl ResilienceConfig {
    /// Create a bundle with each component's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rate limiter settings.
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiter = config;
        self
    }

    /// Replace the bulkhead settings.
    pub fn bulkhead(mut self, config: BulkheadConfig) -> Self {
        self.bulkhead = config;
        self
    }

    /// Replace the circuit breaker settings.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    /// Replace the retry settings.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }
}
