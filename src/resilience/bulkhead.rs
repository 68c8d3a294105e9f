//! Per-provider concurrency isolation.
//!
//! Bounds simultaneously in-flight calls to one provider so a slow
//! backend saturates its own permit pool instead of the whole process.
//! Complements the per-provider worker pools in
//! [`pool`](crate::pool) — the semaphore bounds in-process concurrency,
//! the pools isolate execution contexts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::telemetry;
use crate::{Result, SvalinnError};

/// Configuration for the bulkhead.
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum concurrent in-flight calls. Default: 5.
    pub max_concurrent: usize,
    /// Maximum time to wait for a slot. Default: 10 seconds.
    pub acquire_timeout: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl BulkheadConfig {
    /// Create a config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum concurrent calls.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the maximum time to wait for a slot.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Guard for one in-flight call slot.
///
/// The slot is released exactly once when the guard drops — on success,
/// failure, or cancellation of the protected call.
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

/// Concurrency semaphore for one provider.
///
/// Waiters are queued FIFO by the underlying tokio semaphore.
pub struct Bulkhead {
    provider: String,
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Create a bulkhead for the given provider.
    pub fn new(provider: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
        }
    }

    /// Acquire an in-flight slot, waiting up to the configured timeout.
    ///
    /// Fails with [`SvalinnError::BulkheadFull`] if no slot frees up in
    /// time. Hold the returned permit for the duration of the protected
    /// call; dropping it releases the slot.
    pub async fn acquire(&self) -> Result<BulkheadPermit> {
        let timeout = self.config.acquire_timeout;
        let acquired =
            tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_owned()).await;
        match acquired {
            Ok(Ok(permit)) => Ok(BulkheadPermit { _permit: permit }),
            // The semaphore is never closed, but a rejection is the
            // right answer if it ever were.
            Ok(Err(_)) | Err(_) => {
                metrics::counter!(telemetry::REJECTIONS_TOTAL,
                    "provider" => self.provider.clone(),
                    "reason" => "bulkhead_full",
                )
                .increment(1);
                warn!(
                    provider = %self.provider,
                    max_concurrent = self.config.max_concurrent,
                    waited_ms = timeout.as_millis() as u64,
                    "bulkhead rejected request"
                );
                Err(SvalinnError::BulkheadFull {
                    provider: self.provider.clone(),
                    waited: timeout,
                })
            }
        }
    }

    /// Slots currently free (diagnostic snapshot).
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulkhead(max: usize, timeout: Duration) -> Bulkhead {
        Bulkhead::new(
            "test",
            BulkheadConfig::new()
                .max_concurrent(max)
                .acquire_timeout(timeout),
        )
    }

    #[tokio::test]
    async fn permits_bound_concurrency() {
        let b = bulkhead(2, Duration::from_millis(20));
        let p1 = b.acquire().await.unwrap();
        let _p2 = b.acquire().await.unwrap();
        assert_eq!(b.available_permits(), 0);

        let err = b.acquire().await.unwrap_err();
        assert!(matches!(err, SvalinnError::BulkheadFull { .. }));

        drop(p1);
        assert_eq!(b.available_permits(), 1);
        let _p3 = b.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn permit_released_on_drop_exactly_once() {
        let b = bulkhead(1, Duration::from_millis(20));
        {
            let _p = b.acquire().await.unwrap();
            assert_eq!(b.available_permits(), 0);
        }
        assert_eq!(b.available_permits(), 1);
    }

    #[tokio::test]
    async fn permit_released_when_protected_call_is_cancelled() {
        use std::sync::Arc;

        let b = Arc::new(bulkhead(1, Duration::from_millis(20)));
        let inner = Arc::clone(&b);
        let task = tokio::spawn(async move {
            let _p = inner.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(b.available_permits(), 0);

        task.abort();
        let _ = task.await;
        assert_eq!(b.available_permits(), 1);
    }
}
