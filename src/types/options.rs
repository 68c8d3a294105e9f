//! Request options (provider-agnostic).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options for a single send request.
///
/// The model is required; everything else is optional and left to the
/// provider's defaults when absent. Read-only during execution.
///
/// ```rust
/// # use svalinn::SendOptions;
/// # use std::time::Duration;
/// let options = SendOptions::new("gpt-4o")
///     .max_tokens(1000)
///     .temperature(0.7)
///     .call_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOptions {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Caller-level bound on the provider call including all retries.
    /// Not serialized; it never reaches the provider.
    #[serde(skip)]
    pub call_timeout: Option<Duration>,
}

impl SendOptions {
    /// Create options for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
            system_prompt: None,
            call_timeout: None,
        }
    }

    /// Set the maximum tokens in the response.
    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set response randomness (0.0 = deterministic).
    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set a system prompt sent ahead of the user prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Bound the provider call and all its retries by one deadline.
    /// Admission waits are bounded by their own acquire timeouts. On
    /// expiry the call is treated as a timeout and served by the
    /// fallback generator.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}
