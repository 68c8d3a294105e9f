//! Per-provider worker pools.
//!
//! Each provider gets its own multi-threaded tokio runtime, created
//! lazily on first use, so a provider whose calls block or pile up
//! cannot starve the tasks of another provider. Threads are named
//! `svalinn-<provider>` for debuggability.
//!
//! [`PoolRegistry::shutdown`] hands the runtimes to a dedicated OS
//! thread for teardown, because a tokio runtime must not be dropped
//! from inside an async context.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{Result, SvalinnError};

/// Configuration for the pool registry.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker threads per provider runtime. Default: 5.
    pub threads_per_provider: usize,
    /// Grace period for in-flight tasks at shutdown. Default: 30 s.
    pub shutdown_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads_per_provider: 5,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Create a config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker threads per provider runtime.
    pub fn threads_per_provider(mut self, n: usize) -> Self {
        self.threads_per_provider = n;
        self
    }

    /// Set the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Registry of per-provider runtimes.
///
/// `None` inside the mutex means the registry has been shut down; any
/// later spawn fails with [`SvalinnError::ShutDown`].
pub struct PoolRegistry {
    config: PoolConfig,
    pools: Mutex<Option<HashMap<String, Runtime>>>,
}

impl PoolRegistry {
    /// Create an empty registry. Runtimes are built on first spawn for
    /// each provider.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pools: Mutex::new(Some(HashMap::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<HashMap<String, Runtime>>> {
        self.pools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Spawn a future on the provider's pool, creating the pool if this
    /// is the provider's first task.
    pub fn spawn<F>(&self, provider: &str, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut guard = self.lock();
        let pools = guard.as_mut().ok_or(SvalinnError::ShutDown)?;
        let runtime = match pools.entry(provider.to_owned()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                v.insert(build_runtime(provider, self.config.threads_per_provider)?)
            }
        };
        Ok(runtime.spawn(future))
    }

    /// Number of pools currently alive.
    pub fn pool_count(&self) -> usize {
        self.lock().as_ref().map_or(0, HashMap::len)
    }

    /// Shut down every pool, waiting up to the configured grace period
    /// per pool for in-flight tasks.
    ///
    /// Idempotent; later calls are no-ops. Blocks the calling thread
    /// while pools wind down.
    pub fn shutdown(&self) {
        let Some(pools) = self.lock().take() else {
            return;
        };
        if pools.is_empty() {
            return;
        }
        info!(pools = pools.len(), "shutting down worker pools");
        let grace = self.config.shutdown_grace;
        // Teardown on a plain thread: shutdown_timeout blocks, and the
        // caller may be on a runtime thread.
        let handle = std::thread::spawn(move || {
            for (provider, runtime) in pools {
                debug!(provider = %provider, "pool stopped");
                runtime.shutdown_timeout(grace);
            }
        });
        let _ = handle.join();
    }
}

fn build_runtime(provider: &str, threads: usize) -> Result<Runtime> {
    debug!(provider, threads, "creating worker pool");
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name(format!("svalinn-{provider}"))
        .enable_all()
        .build()
        .map_err(|e| {
            SvalinnError::Configuration(format!("failed to build pool for {provider}: {e}"))
        })
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        // Best-effort for registries dropped without an explicit
        // shutdown; pools already torn down make this a no-op.
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn registry(threads: usize) -> PoolRegistry {
        PoolRegistry::new(
            PoolConfig::new()
                .threads_per_provider(threads)
                .shutdown_grace(Duration::from_millis(100)),
        )
    }

    #[test]
    fn pools_are_created_lazily_per_provider() {
        let registry = registry(1);
        assert_eq!(registry.pool_count(), 0);

        let (tx, rx) = mpsc::channel();
        registry
            .spawn("openai", async move {
                tx.send(42u32).ok();
            })
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        assert_eq!(registry.pool_count(), 1);

        registry.spawn("groq", async {}).unwrap();
        assert_eq!(registry.pool_count(), 2);

        registry.shutdown();
    }

    #[test]
    fn tasks_run_on_named_provider_threads() {
        let registry = registry(1);
        let (tx, rx) = mpsc::channel();
        registry
            .spawn("openai", async move {
                let name = std::thread::current().name().map(str::to_owned);
                tx.send(name).ok();
            })
            .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("svalinn-openai"));

        registry.shutdown();
    }

    #[test]
    fn spawn_after_shutdown_is_rejected() {
        let registry = registry(1);
        registry.spawn("openai", async {}).unwrap();
        registry.shutdown();

        let err = registry.spawn("openai", async {}).unwrap_err();
        assert!(matches!(err, SvalinnError::ShutDown));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let registry = registry(1);
        registry.spawn("openai", async {}).unwrap();
        registry.shutdown();
        registry.shutdown();
        assert_eq!(registry.pool_count(), 0);
    }
}
