//! OpenAI-compatible chat-completions client.
//!
//! Speaks the `/v1/chat/completions` request/response shape shared by
//! OpenAI, Groq, and most self-hosted inference servers, so a single
//! adapter covers every backend exposing that API — construct one per
//! backend with its own base URL and provider id.
//!
//! The adapter maps HTTP outcomes onto the crate error taxonomy and does
//! nothing else: no retry, no caching. Wrap it in a
//! [`ResilientExecutor`](crate::executor::ResilientExecutor) for fault
//! tolerance.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::traits::ProviderClient;
use crate::types::{LlmResponse, SendOptions};
use crate::{Result, SvalinnError};

/// Default per-request HTTP timeout.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for OpenAI-compatible chat completion APIs.
///
/// ```rust,no_run
/// # use svalinn::providers::OpenAiCompatClient;
/// let client = OpenAiCompatClient::new("openai", "https://api.openai.com/v1", "sk-your-key")
///     .expect("client construction");
/// ```
pub struct OpenAiCompatClient {
    provider_id: String,
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("provider_id", &self.provider_id)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatClient {
    /// Create a client for the given backend.
    ///
    /// `base_url` is the API root without the `/chat/completions`
    /// suffix. Fails with a configuration error if the API key is empty
    /// or the HTTP client cannot be built.
    pub fn new(
        provider_id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SvalinnError::Configuration(
                "API key cannot be empty".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| SvalinnError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            provider_id: provider_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    /// Use a pre-built HTTP client (shared connection pool, custom
    /// timeout).
    pub fn with_http_client(
        provider_id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        }
    }

    fn request_body(&self, prompt: &str, options: &SendOptions) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &options.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({
            "model": options.model,
            "messages": messages,
        });
        if let Some(max) = options.max_tokens {
            body["max_tokens"] = json!(max);
        }
        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn map_transport_error(&self, err: reqwest::Error, elapsed: Duration) -> SvalinnError {
        if err.is_timeout() {
            SvalinnError::Timeout {
                provider: self.provider_id.clone(),
                elapsed,
            }
        } else {
            SvalinnError::Network {
                provider: self.provider_id.clone(),
                message: err.to_string(),
            }
        }
    }

    fn map_status_error(&self, status: u16, retry_after: Option<Duration>, body: &str) -> SvalinnError {
        let message = truncate(body, 200).to_string();
        match status {
            429 => SvalinnError::RateLimited {
                provider: self.provider_id.clone(),
                retry_after,
            },
            401 | 403 => SvalinnError::Auth {
                provider: self.provider_id.clone(),
            },
            400..=499 => SvalinnError::Client {
                provider: self.provider_id.clone(),
                status,
                message,
            },
            _ => SvalinnError::Server {
                provider: self.provider_id.clone(),
                status,
                message,
            },
        }
    }

    fn parse_response(&self, body: &str, latency: Duration, model: &str) -> Result<LlmResponse> {
        let parsed: Value =
            serde_json::from_str(body).map_err(|e| SvalinnError::InvalidResponse {
                provider: self.provider_id.clone(),
                message: format!("malformed JSON: {e}"),
            })?;

        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SvalinnError::InvalidResponse {
                provider: self.provider_id.clone(),
                message: "missing choices[0].message.content".into(),
            })?;

        let tokens = parsed["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32;
        let model = parsed["model"].as_str().unwrap_or(model);

        Ok(LlmResponse::new(content, model, &self.provider_id)
            .tokens_used(tokens)
            .latency_ms(latency.as_millis() as u64))
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn send(&self, prompt: &str, options: &SendOptions) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(prompt, options);
        let start = Instant::now();

        debug!(
            provider = %self.provider_id,
            model = %options.model,
            prompt_chars = prompt.len(),
            "sending chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e, start.elapsed()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e, start.elapsed()))?;

        if status != 200 {
            return Err(self.map_status_error(status, retry_after, &text));
        }

        self.parse_response(&text, start.elapsed(), &options.model)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
