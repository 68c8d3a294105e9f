//! Per-provider failure-rate circuit breaker.
//!
//! Count-based sliding window over the last N call outcomes. When the
//! window is full and the failure rate reaches the threshold, the
//! breaker opens and rejects calls without touching the provider. After
//! the open wait elapses, a limited number of probe calls go through;
//! all succeeding closes the breaker, any failing reopens it.
//!
//! Outcome recording and state transition happen as a single atomic step
//! under one lock, so concurrent callers never observe a torn state.
//! [`CircuitBreaker::try_acquire`] hands out a [`CircuitPermit`] that
//! carries the outcome back: only countable failures feed the
//! closed-state window, but in half-open state any failure reopens the
//! circuit, and a permit dropped without an outcome (the call was
//! cancelled) restores its probe slot so recovery stays reachable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::telemetry;
use crate::{Result, SvalinnError};

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of call outcomes in the sliding window. Default: 10.
    pub sliding_window: usize,
    /// Failure rate in [0.0, 1.0] that opens the circuit once the
    /// window is full. Default: 0.5.
    pub failure_rate_threshold: f64,
    /// How long the circuit stays open before probing. Default: 30 s.
    pub open_wait: Duration,
    /// Probe calls allowed through in half-open state. Default: 3.
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window: 10,
            failure_rate_threshold: 0.5,
            open_wait: Duration::from_secs(30),
            half_open_probes: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sliding window size.
    pub fn sliding_window(mut self, size: usize) -> Self {
        self.sliding_window = size;
        self
    }

    /// Set the failure rate threshold in [0.0, 1.0].
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Set the open-state wait before probing.
    pub fn open_wait(mut self, wait: Duration) -> Self {
        self.open_wait = wait;
        self
    }

    /// Set the number of half-open probe calls.
    pub fn half_open_probes(mut self, probes: u32) -> Self {
        self.half_open_probes = probes;
        self
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; outcomes feed the sliding window.
    Closed,
    /// Rejecting all calls until the open wait elapses.
    Open,
    /// Allowing a limited number of probe calls.
    HalfOpen,
}

impl CircuitState {
    fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

struct Inner {
    state: CircuitState,
    /// Ring of recent outcomes; `true` = failure.
    window: VecDeque<bool>,
    opened_at: Instant,
    probes_remaining: u32,
    probe_successes: u32,
}

/// Permission for one logical call.
///
/// Consume it with [`success`](Self::success) or
/// [`failure`](Self::failure). Dropping it unconsumed (the guarded call
/// was cancelled) returns the probe slot it may hold, so a cancelled
/// half-open probe never burns the recovery budget.
#[must_use = "consume the permit with success() or failure()"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    consumed: bool,
}

impl std::fmt::Debug for CircuitPermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitPermit")
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

impl CircuitPermit<'_> {
    /// Record the guarded call as successful.
    pub fn success(mut self) {
        self.consumed = true;
        self.breaker.record_success();
    }

    /// Record the guarded call as failed.
    ///
    /// `countable` says whether the error reflects provider health
    /// ([`SvalinnError::counts_as_failure`](crate::SvalinnError::counts_as_failure)).
    /// Non-countable failures stay out of the closed-state window, but a
    /// half-open probe that fails for any reason reopens the circuit —
    /// the probe did not demonstrate recovery.
    pub fn failure(mut self, countable: bool) {
        self.consumed = true;
        self.breaker.record_failure(countable);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            self.breaker.restore_probe();
        }
    }
}

/// Failure-rate state machine for one provider.
pub struct CircuitBreaker {
    provider: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    pub fn new(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(config.sliding_window),
                opened_at: Instant::now(),
                probes_remaining: 0,
                probe_successes: 0,
            }),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL,
            "provider" => self.provider.clone(),
            "transition" => format!("{}_to_{}", from.label(), to.label()),
        )
        .increment(1);
        warn!(
            provider = %self.provider,
            from = from.label(),
            to = to.label(),
            "circuit breaker state transition"
        );
    }

    /// Ask permission to attempt one logical call.
    ///
    /// Fails with [`SvalinnError::CircuitOpen`] when the circuit is open
    /// (and the wait has not elapsed) or when all half-open probe slots
    /// are taken. The returned permit carries the call's outcome back.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(self.permit()),
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.config.open_wait {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probes_remaining = self.config.half_open_probes;
                    inner.probe_successes = 0;
                    self.take_probe(&mut inner)
                } else {
                    self.reject()
                }
            }
            CircuitState::HalfOpen => self.take_probe(&mut inner),
        }
    }

    fn permit(&self) -> CircuitPermit<'_> {
        CircuitPermit {
            breaker: self,
            consumed: false,
        }
    }

    fn take_probe(&self, inner: &mut Inner) -> Result<CircuitPermit<'_>> {
        if inner.probes_remaining > 0 {
            inner.probes_remaining -= 1;
            Ok(self.permit())
        } else {
            self.reject()
        }
    }

    /// Hand back an unconsumed permit's probe slot.
    fn restore_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen
            && inner.probes_remaining < self.config.half_open_probes
        {
            inner.probes_remaining += 1;
        }
    }

    fn reject(&self) -> Result<CircuitPermit<'_>> {
        metrics::counter!(telemetry::REJECTIONS_TOTAL,
            "provider" => self.provider.clone(),
            "reason" => "circuit_open",
        )
        .increment(1);
        Err(SvalinnError::CircuitOpen {
            provider: self.provider.clone(),
        })
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                // The rate is evaluated on every outcome once the
                // window is full; a success can still leave it at the
                // threshold.
                self.push_outcome(&mut inner, false);
                self.open_if_over_threshold(&mut inner);
            }
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.half_open_probes {
                    // Recovered: close and forget the old failures.
                    inner.window.clear();
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            // Stale probe completing after the circuit reopened.
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, countable: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                if countable {
                    self.push_outcome(&mut inner, true);
                    self.open_if_over_threshold(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any probe failure reopens immediately, countable or
                // not: the probe did not prove the provider healthy.
                inner.opened_at = Instant::now();
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn open_if_over_threshold(&self, inner: &mut Inner) {
        if inner.window.len() >= self.config.sliding_window
            && self.failure_rate_of(inner) >= self.config.failure_rate_threshold
        {
            inner.opened_at = Instant::now();
            self.transition(inner, CircuitState::Open);
        }
    }

    fn push_outcome(&self, inner: &mut Inner, failure: bool) {
        if inner.window.len() >= self.config.sliding_window {
            inner.window.pop_front();
        }
        inner.window.push_back(failure);
    }

    fn failure_rate_of(&self, inner: &Inner) -> f64 {
        if inner.window.is_empty() {
            return 0.0;
        }
        let failures = inner.window.iter().filter(|&&f| f).count();
        failures as f64 / inner.window.len() as f64
    }

    /// Current state.
    ///
    /// An elapsed open wait is only observed on the next
    /// [`try_acquire`](Self::try_acquire); until then this still reports
    /// [`CircuitState::Open`].
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failure rate over the current window, in [0.0, 1.0].
    pub fn failure_rate(&self) -> f64 {
        let inner = self.lock();
        self.failure_rate_of(&inner)
    }
}
