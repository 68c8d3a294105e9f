//! Gateway composition root.
//!
//! [`Svalinn`] owns the shared response cache, the per-provider worker
//! pools, and one lazily-built [`ResilientExecutor`] per registered
//! provider. Requests are dispatched onto the target provider's pool so
//! a stalled backend cannot starve another provider's work.

mod builder;

pub use builder::SvalinnBuilder;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStats, ResponseCache};
use crate::executor::ResilientExecutor;
use crate::pool::PoolRegistry;
use crate::providers::ProviderClient;
use crate::resilience::{CircuitState, ResilienceConfig};
use crate::types::{LlmResponse, SendOptions};
use crate::{Result, SvalinnError};

/// The gateway. Construct one with [`Svalinn::builder`] and share it
/// behind an `Arc`.
///
/// ```rust,no_run
/// # use svalinn::{Svalinn, SendOptions};
/// # async fn demo() -> svalinn::Result<()> {
/// let gateway = Svalinn::builder()
///     .openai_compatible("openai", "https://api.openai.com/v1", "sk-your-key")?
///     .build()?;
///
/// let response = gateway
///     .send("openai", "mine some iron", &SendOptions::new("gpt-4o"))
///     .await?;
/// println!("{}", response.content());
/// # Ok(())
/// # }
/// ```
pub struct Svalinn {
    clients: HashMap<String, Arc<dyn ProviderClient>>,
    cache: Arc<ResponseCache>,
    pools: PoolRegistry,
    resilience: ResilienceConfig,
    executors: Mutex<HashMap<String, Arc<ResilientExecutor>>>,
}

impl std::fmt::Debug for Svalinn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Svalinn")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("resilience", &self.resilience)
            .finish_non_exhaustive()
    }
}

/// In-flight request dispatched by [`Svalinn::send_async`].
///
/// Dropping it before completion cancels the pooled task: no further
/// retry attempts are started and the bulkhead permit is released at
/// the task's next await point.
#[must_use = "the request is cancelled if this future is dropped"]
pub struct PendingResponse {
    handle: JoinHandle<Result<LlmResponse>>,
}

impl Future for PendingResponse {
    type Output = Result<LlmResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The pool was torn down under us (tasks are aborted at
            // shutdown) or the task panicked.
            Poll::Ready(Err(_)) => Poll::Ready(Err(SvalinnError::ShutDown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        // No-op when the task has already finished.
        self.handle.abort();
    }
}

impl Svalinn {
    /// Start building a gateway.
    pub fn builder() -> SvalinnBuilder {
        SvalinnBuilder::new()
    }

    pub(crate) fn from_parts(
        clients: HashMap<String, Arc<dyn ProviderClient>>,
        cache: ResponseCache,
        pools: PoolRegistry,
        resilience: ResilienceConfig,
    ) -> Self {
        info!(providers = clients.len(), "gateway initialized");
        Self {
            clients,
            cache: Arc::new(cache),
            pools,
            resilience,
            executors: Mutex::new(HashMap::new()),
        }
    }

    /// Execute a request against the named provider, on that provider's
    /// worker pool.
    ///
    /// Terminal provider failures are served by the fallback generator,
    /// so after admission the result is almost always `Ok`; errors are
    /// an unknown provider, invalid input, or a gateway that has been
    /// shut down.
    pub async fn send(
        &self,
        provider: &str,
        prompt: &str,
        options: &SendOptions,
    ) -> Result<LlmResponse> {
        self.send_async(provider, prompt, options)?.await
    }

    /// Dispatch a request without waiting for it.
    ///
    /// The pipeline starts running on the provider's pool before the
    /// returned future is polled. An unknown provider or a shut-down
    /// gateway fails synchronously. Dropping the returned
    /// [`PendingResponse`] cancels the request.
    pub fn send_async(
        &self,
        provider: &str,
        prompt: &str,
        options: &SendOptions,
    ) -> Result<PendingResponse> {
        let executor = self.executor(provider)?;
        let prompt = prompt.to_owned();
        let options = options.clone();
        let handle = self
            .pools
            .spawn(provider, async move { executor.send(&prompt, &options).await })?;
        Ok(PendingResponse { handle })
    }

    /// The executor for a provider, created on first use.
    pub fn executor(&self, provider: &str) -> Result<Arc<ResilientExecutor>> {
        let mut executors = self
            .executors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(executor) = executors.get(provider) {
            return Ok(Arc::clone(executor));
        }
        let client = self.clients.get(provider).ok_or_else(|| {
            SvalinnError::Configuration(format!("unknown provider '{provider}'"))
        })?;
        debug!(provider, "creating executor");
        let executor = Arc::new(ResilientExecutor::new(
            Arc::clone(client),
            Arc::clone(&self.cache),
            &self.resilience,
        ));
        executors.insert(provider.to_owned(), Arc::clone(&executor));
        Ok(executor)
    }

    /// Registered provider ids, in no particular order.
    pub fn providers(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    /// Whether a provider's circuit breaker is not open.
    ///
    /// Providers that have not served a request yet are healthy.
    pub fn is_healthy(&self, provider: &str) -> Result<bool> {
        Ok(self.executor(provider)?.is_healthy())
    }

    /// A provider's current circuit breaker state.
    pub fn circuit_state(&self, provider: &str) -> Result<CircuitState> {
        Ok(self.executor(provider)?.circuit_state())
    }

    /// Snapshot of the shared response cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Shut down the worker pools, waiting up to the configured grace
    /// period for in-flight requests.
    ///
    /// Idempotent. Subsequent [`send`](Self::send) calls fail with
    /// [`SvalinnError::ShutDown`]. Blocks the calling thread while the
    /// pools wind down.
    pub fn shutdown(&self) {
        info!("gateway shutting down");
        self.pools.shutdown();
    }
}
