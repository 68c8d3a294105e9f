//! Per-provider request-rate admission control.
//!
//! Fixed quota per window with full-quota refill at each window boundary
//! (not a smooth leak). This is a deliberate policy choice carried over
//! from the source system, not a bug: all permits become available at
//! once when the window rolls, so pacing is bursty at boundaries.
//! Callers that need smoother pacing should lower the quota rather than
//! expect a leaky bucket.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::telemetry;
use crate::{Result, SvalinnError};

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Permits available per window. Default: 10.
    pub permits_per_window: u32,
    /// Window duration. Default: 1 minute.
    pub window: Duration,
    /// Maximum time to wait for a permit. Default: 5 seconds.
    pub acquire_timeout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            permits_per_window: 10,
            window: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl RateLimiterConfig {
    /// Create a config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permits per window.
    pub fn permits_per_window(mut self, n: u32) -> Self {
        self.permits_per_window = n;
        self
    }

    /// Set the window duration.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the maximum time to wait for a permit.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

struct WindowState {
    permits_remaining: u32,
    window_start: Instant,
}

/// Token-bucket-style admission control for one provider.
///
/// Waiters are served in arrival order: acquisition queues on a tokio
/// mutex (FIFO), and a waiter that reaches the head of the queue holds
/// its place while sleeping until the next window boundary. A waiter
/// whose timeout fires leaves the queue without consuming a permit.
pub struct RateLimiter {
    provider: String,
    config: RateLimiterConfig,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a rate limiter for the given provider.
    pub fn new(provider: impl Into<String>, config: RateLimiterConfig) -> Self {
        Self {
            provider: provider.into(),
            state: Mutex::new(WindowState {
                permits_remaining: config.permits_per_window,
                window_start: Instant::now(),
            }),
            config,
        }
    }

    /// Acquire one permit, waiting up to the configured timeout.
    ///
    /// Fails with [`SvalinnError::RateLimitExceeded`] if no permit
    /// becomes available in time; the failed acquisition consumes
    /// nothing.
    pub async fn acquire(&self) -> Result<()> {
        let timeout = self.config.acquire_timeout;
        match tokio::time::timeout(timeout, self.acquire_inner()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                metrics::counter!(telemetry::REJECTIONS_TOTAL,
                    "provider" => self.provider.clone(),
                    "reason" => "rate_limit_exceeded",
                )
                .increment(1);
                warn!(
                    provider = %self.provider,
                    limit = self.config.permits_per_window,
                    waited_ms = timeout.as_millis() as u64,
                    "rate limiter rejected request"
                );
                Err(SvalinnError::RateLimitExceeded {
                    provider: self.provider.clone(),
                    waited: timeout,
                })
            }
        }
    }

    async fn acquire_inner(&self) {
        let mut state = self.state.lock().await;
        loop {
            // One clock read per iteration; re-reading for the sleep
            // below could see the boundary pass in between and
            // underflow the subtraction.
            let elapsed = state.window_start.elapsed();
            if elapsed >= self.config.window {
                // Window boundary: the full quota becomes available at
                // once. Advance by whole windows so long idle periods
                // don't accumulate quota.
                let windows = (elapsed.as_nanos() / self.config.window.as_nanos()) as u32;
                state.window_start += self.config.window * windows;
                state.permits_remaining = self.config.permits_per_window;
            }
            if state.permits_remaining > 0 {
                state.permits_remaining -= 1;
                return;
            }
            // Hold the lock while sleeping to the boundary so waiters
            // behind us keep their arrival order. A zero sleep loops
            // straight back into the refill branch.
            let until_boundary = self.config.window.saturating_sub(elapsed);
            tokio::time::sleep(until_boundary).await;
        }
    }

    /// Permits left in the current window (diagnostic snapshot).
    pub async fn permits_remaining(&self) -> u32 {
        self.state.lock().await.permits_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(permits: u32, window: Duration, timeout: Duration) -> RateLimiterConfig {
        RateLimiterConfig::new()
            .permits_per_window(permits)
            .window(window)
            .acquire_timeout(timeout)
    }

    #[tokio::test]
    async fn allows_quota_within_window() {
        let limiter = RateLimiter::new(
            "test",
            config(3, Duration::from_secs(60), Duration::from_millis(10)),
        );
        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(limiter.permits_remaining().await, 0);
    }

    #[tokio::test]
    async fn rejects_after_timeout_when_exhausted() {
        let limiter = RateLimiter::new(
            "test",
            config(1, Duration::from_secs(60), Duration::from_millis(20)),
        );
        limiter.acquire().await.unwrap();

        let err = limiter.acquire().await.unwrap_err();
        assert!(matches!(err, SvalinnError::RateLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn full_quota_returns_at_window_boundary() {
        let limiter = RateLimiter::new(
            "test",
            config(2, Duration::from_millis(50), Duration::from_millis(200)),
        );
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();

        // Blocks until the boundary, then succeeds.
        limiter.acquire().await.unwrap();
        // The refill was the full quota, so one more permit remains.
        assert_eq!(limiter.permits_remaining().await, 1);
    }

    #[tokio::test]
    async fn acquire_after_the_boundary_already_passed_refills_immediately() {
        // The window expires while nobody is acquiring; the next
        // acquire sees elapsed > window and must refill and return
        // without sleeping (and without panicking on the boundary
        // arithmetic).
        let limiter = RateLimiter::new(
            "test",
            config(1, Duration::from_millis(20), Duration::from_millis(10)),
        );
        limiter.acquire().await.unwrap();
        assert_eq!(limiter.permits_remaining().await, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        limiter.acquire().await.unwrap();
        assert_eq!(limiter.permits_remaining().await, 0);
    }

    #[tokio::test]
    async fn waiters_served_in_arrival_order() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let limiter = Arc::new(RateLimiter::new(
            "test",
            config(1, Duration::from_millis(40), Duration::from_secs(2)),
        ));
        limiter.acquire().await.unwrap();

        let order = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for i in 0..3 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await.unwrap();
                (i, order.fetch_add(1, Ordering::SeqCst))
            }));
            // Stagger arrivals so the queue order is deterministic.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results.sort_by_key(|&(i, _)| i);
        let served: Vec<usize> = results.iter().map(|&(_, pos)| pos).collect();
        assert_eq!(served, vec![0, 1, 2]);
    }
}
