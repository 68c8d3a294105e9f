//! Response cache keyed on request fingerprints.
//!
//! [`ResponseCache`] is shared across all providers and sits at the
//! front of the executor pipeline: a hit bypasses rate limiting, the
//! bulkhead, the circuit breaker, and retry entirely. Failures are never
//! cached.
//!
//! Keys are SHA-256 digests of (provider, model, prompt) —
//! collision-resistant hashing is required because prompts are
//! user-influenced text of unbounded length, so an accidental (or
//! crafted) collision would hand one caller another caller's response.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::telemetry;
use crate::types::LlmResponse;

/// Deterministic digest of (provider, model, prompt), used as the cache
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint for a request.
    ///
    /// Fields are length-prefix separated so that no two distinct
    /// (provider, model, prompt) triples share a preimage.
    pub fn compute(provider: &str, model: &str, prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [provider, model, prompt] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Short hex prefix for logging.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Configuration for the response cache.
///
/// ```rust
/// # use svalinn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(1_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries before LRU eviction. Default: 500.
    pub max_entries: u64,
    /// Time-to-live from insertion. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Snapshot of cache counters.
///
/// Counters are relaxed atomics — eventually consistent under
/// concurrency, which is all observability needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Approximate entry count (moka's estimate).
    pub entries: u64,
}

impl CacheStats {
    /// Hit rate in [0.0, 1.0]; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded, time-expiring store of provider responses.
///
/// moka provides O(1) expected lookup/insert, LRU eviction at capacity,
/// and TTL expiry (expired entries read as absent even before physical
/// eviction). Fully thread-safe; no external locking needed.
pub struct ResponseCache {
    entries: moka::sync::Cache<Fingerprint, LlmResponse>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: moka::sync::Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached response.
    ///
    /// Returns `None` on miss or expiry. Served responses always carry
    /// `from_cache = true`.
    pub fn get(&self, fingerprint: &Fingerprint, provider: &str) -> Option<LlmResponse> {
        match self.entries.get(fingerprint) {
            Some(response) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "provider" => provider.to_owned())
                    .increment(1);
                debug!(provider, key = %fingerprint.short(), "cache hit");
                Some(response)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "provider" => provider.to_owned())
                    .increment(1);
                debug!(provider, key = %fingerprint.short(), "cache miss");
                None
            }
        }
    }

    /// Store a response.
    ///
    /// The stored value always has its cache-origin flag forced to true,
    /// independent of the flag on `response`, so later readers can
    /// distinguish hits from fresh calls. Last write wins for a given
    /// fingerprint.
    pub fn put(&self, fingerprint: Fingerprint, response: &LlmResponse) {
        self.entries.insert(fingerprint, response.with_cache_flag(true));
    }

    /// Snapshot of hit/miss counters and the approximate size.
    pub fn stats(&self) -> CacheStats {
        // run_pending_tasks folds in lazily-processed evictions so the
        // estimate tracks reality in tests and dashboards.
        self.entries.run_pending_tasks();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.entry_count(),
        }
    }

    /// Evict all entries. Counters are preserved.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
