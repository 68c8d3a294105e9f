//! Provider client contract.
//!
//! A [`ProviderClient`] is the narrow seam between the resilience
//! pipeline and a concrete backend's wire format. Implementations own
//! request/response encoding only — no retry, no caching, no admission
//! control. All of that is layered on by
//! [`ResilientExecutor`](crate::executor::ResilientExecutor).

use async_trait::async_trait;

use crate::Result;
use crate::types::{LlmResponse, SendOptions};

/// Client for one text-generation backend.
///
/// # Contract
///
/// - `send` performs network I/O and may suspend, but must not hold any
///   shared lock across the call.
/// - Must not retry internally; retry is owned exclusively by the
///   executor's retry policy.
/// - Must be safely callable concurrently — no shared mutable state
///   across calls beyond immutable configuration.
/// - Failures use the crate error kinds (timeout, network, server,
///   provider rate limit, auth, client, invalid response) so the
///   resilience layers can classify them without parsing messages.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable lowercase provider id (e.g. "openai", "groq"). Used for
    /// cache keys, per-provider resilience state, pool selection, and
    /// logging.
    fn provider_id(&self) -> &str;

    /// Send a single-shot prompt and await the completed response.
    async fn send(&self, prompt: &str, options: &SendOptions) -> Result<LlmResponse>;
}
