//! Svalinn error types.
//!
//! Every failure kind carries enough context for the resilience layers to
//! make routing decisions without inspecting message strings:
//!
//! - [`SvalinnError::is_retryable()`] — consulted by the retry policy.
//! - [`SvalinnError::counts_as_failure()`] — consulted by the circuit
//!   breaker. Admission rejections and caller-side mistakes never feed
//!   the failure window; only provider-level problems do.
//! - [`SvalinnError::retry_after()`] — provider backoff hints.

use std::time::Duration;

/// Svalinn error types.
#[derive(Debug, thiserror::Error)]
pub enum SvalinnError {
    // Admission rejections raised by our own resilience layers.
    #[error("rate limit exceeded for provider '{provider}' after waiting {waited:?}")]
    RateLimitExceeded { provider: String, waited: Duration },

    #[error("bulkhead full for provider '{provider}' after waiting {waited:?}")]
    BulkheadFull { provider: String, waited: Duration },

    #[error("circuit breaker open for provider '{provider}'")]
    CircuitOpen { provider: String },

    // Provider/network errors.
    #[error("request to provider '{provider}' timed out after {elapsed:?}")]
    Timeout { provider: String, elapsed: Duration },

    #[error("network error from provider '{provider}': {message}")]
    Network { provider: String, message: String },

    #[error("provider '{provider}' server error ({status}): {message}")]
    Server {
        provider: String,
        status: u16,
        message: String,
    },

    /// The provider itself rejected the call with a rate-limit signal
    /// (HTTP 429). Distinct from [`SvalinnError::RateLimitExceeded`],
    /// which is our own admission control: a provider 429 is retryable
    /// after backing off, an admission rejection is not.
    #[error("provider '{provider}' rate limited the request, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("authentication failed for provider '{provider}'")]
    Auth { provider: String },

    #[error("client error from provider '{provider}' ({status}): {message}")]
    Client {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from provider '{provider}': {message}")]
    InvalidResponse { provider: String, message: String },

    // Caller and configuration errors.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("gateway has been shut down")]
    ShutDown,
}

impl SvalinnError {
    /// Whether the retry policy may re-attempt after this error.
    ///
    /// Transient provider-side conditions (timeouts, network faults,
    /// 5xx, provider 429) are retryable; admission rejections and
    /// malformed requests/responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SvalinnError::Timeout { .. }
                | SvalinnError::Network { .. }
                | SvalinnError::Server { .. }
                | SvalinnError::RateLimited { .. }
        )
    }

    /// Whether this error counts toward the circuit breaker's failure
    /// window.
    ///
    /// Provider-level problems count; caller-side mistakes (bad input,
    /// malformed request) indicate a bug in the caller, not provider
    /// health, and must not trip the breaker. Admission rejections never
    /// reach the breaker at all.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            SvalinnError::Timeout { .. }
                | SvalinnError::Network { .. }
                | SvalinnError::Server { .. }
                | SvalinnError::RateLimited { .. }
                | SvalinnError::Auth { .. }
                | SvalinnError::InvalidResponse { .. }
        )
    }

    /// Provider-suggested backoff, if the provider sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SvalinnError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// The provider this error originated from, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            SvalinnError::RateLimitExceeded { provider, .. }
            | SvalinnError::BulkheadFull { provider, .. }
            | SvalinnError::CircuitOpen { provider }
            | SvalinnError::Timeout { provider, .. }
            | SvalinnError::Network { provider, .. }
            | SvalinnError::Server { provider, .. }
            | SvalinnError::RateLimited { provider, .. }
            | SvalinnError::Auth { provider }
            | SvalinnError::Client { provider, .. }
            | SvalinnError::InvalidResponse { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Stable label for metrics and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SvalinnError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            SvalinnError::BulkheadFull { .. } => "bulkhead_full",
            SvalinnError::CircuitOpen { .. } => "circuit_open",
            SvalinnError::Timeout { .. } => "timeout",
            SvalinnError::Network { .. } => "network",
            SvalinnError::Server { .. } => "server",
            SvalinnError::RateLimited { .. } => "rate_limited",
            SvalinnError::Auth { .. } => "auth",
            SvalinnError::Client { .. } => "client",
            SvalinnError::InvalidResponse { .. } => "invalid_response",
            SvalinnError::InvalidInput(_) => "invalid_input",
            SvalinnError::Configuration(_) => "configuration",
            SvalinnError::ShutDown => "shut_down",
        }
    }
}

/// Result type alias for svalinn operations.
pub type Result<T> = std::result::Result<T, SvalinnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rejections_are_not_retryable() {
        let e = SvalinnError::RateLimitExceeded {
            provider: "openai".into(),
            waited: Duration::from_secs(5),
        };
        assert!(!e.is_retryable());
        assert!(!e.counts_as_failure());
    }

    #[test]
    fn provider_rate_limit_is_retryable_and_countable() {
        let e = SvalinnError::RateLimited {
            provider: "openai".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(e.is_retryable());
        assert!(e.counts_as_failure());
        assert_eq!(e.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn caller_side_errors_do_not_count() {
        let e = SvalinnError::Client {
            provider: "openai".into(),
            status: 400,
            message: "bad request".into(),
        };
        assert!(!e.is_retryable());
        assert!(!e.counts_as_failure());

        assert!(!SvalinnError::InvalidInput("empty prompt".into()).counts_as_failure());
    }

    #[test]
    fn auth_counts_but_is_not_retryable() {
        let e = SvalinnError::Auth {
            provider: "groq".into(),
        };
        assert!(!e.is_retryable());
        assert!(e.counts_as_failure());
    }
}
