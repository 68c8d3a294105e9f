//! Telemetry metric name constants.
//!
//! Centralised metric names for svalinn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `svalinn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider id (e.g. "openai", "groq")
//! - `status` — outcome: "ok" or "error"
//! - `reason` — rejection or failure kind (error kind label)
//! - `transition` — circuit transition, e.g. "closed_to_open"

/// Total requests dispatched through an executor.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "svalinn_requests_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "svalinn_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "svalinn_retries_total";

/// Total response cache hits.
///
/// Labels: `provider`.
pub const CACHE_HITS_TOTAL: &str = "svalinn_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `provider`.
pub const CACHE_MISSES_TOTAL: &str = "svalinn_cache_misses_total";

/// Total calls rejected by an admission layer before reaching the
/// provider.
///
/// Labels: `provider`, `reason` ("rate_limit_exceeded" | "bulkhead_full"
/// | "circuit_open").
pub const REJECTIONS_TOTAL: &str = "svalinn_rejections_total";

/// Total fallback responses served in place of a provider response.
///
/// Labels: `provider`, `reason` (terminal error kind).
pub const FALLBACKS_TOTAL: &str = "svalinn_fallbacks_total";

/// Total circuit breaker state transitions.
///
/// Labels: `provider`, `transition`.
pub const CIRCUIT_TRANSITIONS_TOTAL: &str = "svalinn_circuit_transitions_total";
