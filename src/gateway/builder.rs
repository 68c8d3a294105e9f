//! Gateway builder.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheConfig, ResponseCache};
use crate::gateway::Svalinn;
use crate::pool::{PoolConfig, PoolRegistry};
use crate::providers::{OpenAiCompatClient, ProviderClient};
use crate::resilience::ResilienceConfig;
use crate::{Result, SvalinnError};

impl std::fmt::Debug for SvalinnBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvalinnBuilder")
            .field(
                "clients",
                &self.clients.iter().map(|c| c.provider_id()).collect::<Vec<_>>(),
            )
            .field("cache", &self.cache)
            .field("resilience", &self.resilience)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Builder for [`Svalinn`].
///
/// At least one provider is required; everything else has defaults.
///
/// ```rust,no_run
/// # use svalinn::{Svalinn, CacheConfig};
/// # use std::time::Duration;
/// # fn demo() -> svalinn::Result<Svalinn> {
/// Svalinn::builder()
///     .openai_compatible("openai", "https://api.openai.com/v1", "sk-key")?
///     .openai_compatible("groq", "https://api.groq.com/openai/v1", "gsk-key")?
///     .cache_config(CacheConfig::new().ttl(Duration::from_secs(600)))
///     .build()
/// # }
/// ```
#[derive(Default)]
pub struct SvalinnBuilder {
    clients: Vec<Arc<dyn ProviderClient>>,
    cache: CacheConfig,
    resilience: ResilienceConfig,
    pool: PoolConfig,
}

impl SvalinnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider client.
    pub fn provider(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.push(client);
        self
    }

    /// Register an OpenAI-compatible backend by its base URL and key.
    ///
    /// Fails if the API key is empty.
    pub fn openai_compatible(
        self,
        provider_id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = OpenAiCompatClient::new(provider_id, base_url, api_key)?;
        Ok(self.provider(Arc::new(client)))
    }

    /// Replace the response cache settings.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Replace the per-provider resilience settings.
    pub fn resilience_config(mut self, config: ResilienceConfig) -> Self {
        self.resilience = config;
        self
    }

    /// Replace the worker pool settings.
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool = config;
        self
    }

    /// Build the gateway.
    ///
    /// Fails if no provider was registered, if a provider id is empty,
    /// or if two providers share an id.
    pub fn build(self) -> Result<Svalinn> {
        if self.clients.is_empty() {
            return Err(SvalinnError::Configuration(
                "at least one provider is required".into(),
            ));
        }
        let mut clients: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        for client in self.clients {
            let id = client.provider_id().to_owned();
            if id.trim().is_empty() {
                return Err(SvalinnError::Configuration(
                    "provider id must not be empty".into(),
                ));
            }
            if clients.insert(id.clone(), client).is_some() {
                return Err(SvalinnError::Configuration(format!(
                    "duplicate provider id '{id}'"
                )));
            }
        }
        Ok(Svalinn::from_parts(
            clients,
            ResponseCache::new(&self.cache),
            PoolRegistry::new(self.pool),
            self.resilience,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_providers_fails() {
        let err = SvalinnBuilder::new().build().unwrap_err();
        assert!(matches!(err, SvalinnError::Configuration(_)));
    }

    #[test]
    fn duplicate_provider_ids_rejected() {
        let err = SvalinnBuilder::new()
            .openai_compatible("openai", "http://localhost", "k1")
            .unwrap()
            .openai_compatible("openai", "http://localhost", "k2")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, SvalinnError::Configuration(_)));
    }

    #[test]
    fn empty_api_key_surfaces_configuration_error() {
        let err = SvalinnBuilder::new()
            .openai_compatible("openai", "http://localhost", "")
            .unwrap_err();
        assert!(matches!(err, SvalinnError::Configuration(_)));
    }
}
