//! Provider response value type.

use serde::{Deserialize, Serialize};

/// Immutable response from a text-generation provider.
///
/// Created once per completed call (or cache hit) and never mutated; the
/// cache derives its own copy via [`LlmResponse::with_cache_flag`].
/// Required fields (content, model, provider id) are constructor
/// parameters, so a response without them cannot be built; metadata is
/// attached with consuming setters:
///
/// ```rust
/// # use svalinn::LlmResponse;
/// let response = LlmResponse::new("{\"action\":\"mine\"}", "gpt-4o", "openai")
///     .tokens_used(150)
///     .latency_ms(1234);
/// assert!(!response.from_cache());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    content: String,
    model: String,
    provider_id: String,
    tokens_used: u32,
    latency_ms: u64,
    from_cache: bool,
}

impl LlmResponse {
    /// Create a response with the required fields.
    ///
    /// Token usage and latency default to zero; `from_cache` starts
    /// false — only the cache flips it, via [`with_cache_flag`](Self::with_cache_flag).
    pub fn new(
        content: impl Into<String>,
        model: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            provider_id: provider_id.into(),
            tokens_used: 0,
            latency_ms: 0,
            from_cache: false,
        }
    }

    /// Set total tokens consumed (prompt + completion).
    pub fn tokens_used(mut self, tokens: u32) -> Self {
        self.tokens_used = tokens;
        self
    }

    /// Set end-to-end provider latency in milliseconds.
    ///
    /// Measures the provider call only, not time spent waiting in the
    /// rate limiter or bulkhead queues.
    pub fn latency_ms(mut self, latency: u64) -> Self {
        self.latency_ms = latency;
        self
    }

    /// Derive a copy with the cache-origin flag set.
    ///
    /// Used by the response cache when storing and serving entries.
    pub fn with_cache_flag(&self, from_cache: bool) -> Self {
        Self {
            from_cache,
            ..self.clone()
        }
    }

    /// The generated text content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The model that produced this response.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The provider that produced this response, or `"fallback"` for
    /// degraded-mode responses.
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Total tokens consumed, or 0 if unavailable.
    pub fn tokens(&self) -> u32 {
        self.tokens_used
    }

    /// Provider call latency in milliseconds.
    pub fn latency(&self) -> u64 {
        self.latency_ms
    }

    /// Whether this response was served from the cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_zeroed_and_uncached() {
        let r = LlmResponse::new("hello", "gpt-4o", "openai");
        assert_eq!(r.tokens(), 0);
        assert_eq!(r.latency(), 0);
        assert!(!r.from_cache());
    }

    #[test]
    fn cache_flag_copy_preserves_everything_else() {
        let r = LlmResponse::new("hello", "gpt-4o", "openai")
            .tokens_used(42)
            .latency_ms(900);
        let cached = r.with_cache_flag(true);
        assert!(cached.from_cache());
        assert_eq!(cached.content(), r.content());
        assert_eq!(cached.tokens(), 42);
        assert_eq!(cached.latency(), 900);
        assert!(!r.from_cache()); // original untouched
    }
}
