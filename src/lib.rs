//! Svalinn — a resilient execution gateway for LLM providers.
//!
//! Wraps provider clients in a layered fault-tolerance pipeline:
//! response caching, rate limiting, bulkheading, circuit breaking,
//! retry with exponential backoff, and pattern-matched fallback
//! responses when everything else fails. Each provider runs on its own
//! worker pool so one misbehaving backend cannot drag down the rest.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use svalinn::{SendOptions, Svalinn};
//!
//! # async fn demo() -> svalinn::Result<()> {
//! let gateway = Svalinn::builder()
//!     .openai_compatible("openai", "https://api.openai.com/v1", "sk-your-key")?
//!     .build()?;
//!
//! let response = gateway
//!     .send("openai", "build me a shelter", &SendOptions::new("gpt-4o"))
//!     .await?;
//! println!("{} ({} tokens)", response.content(), response.tokens());
//!
//! gateway.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! # Degradation ladder
//!
//! A request falls through these layers in order; the first one that
//! can answer, does:
//!
//! 1. response cache — previously seen (provider, model, prompt)
//! 2. the provider itself, behind rate limiter, bulkhead, and circuit
//!    breaker, with transient failures retried
//! 3. the fallback generator — a canned intent-matched response, so
//!    callers always get *something* usable
//!
//! # Observability
//!
//! Structured logs go through [`tracing`]; metric names are in
//! [`telemetry`] and emitted through the [`metrics`] facade — install
//! any recorder to collect them.

pub mod cache;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod pool;
pub mod providers;
pub mod resilience;
pub mod telemetry;
pub mod types;

pub use cache::{CacheConfig, CacheStats};
pub use error::{Result, SvalinnError};
pub use executor::ResilientExecutor;
pub use gateway::{PendingResponse, Svalinn, SvalinnBuilder};
pub use pool::PoolConfig;
pub use providers::ProviderClient;
pub use resilience::{
    BulkheadConfig, CircuitBreakerConfig, CircuitState, RateLimiterConfig, ResilienceConfig,
    RetryConfig,
};
pub use types::{LlmResponse, SendOptions};
