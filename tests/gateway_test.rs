//! Tests for gateway composition: builder validation, per-provider
//! executors, pool dispatch, and shutdown semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use svalinn::{
    BulkheadConfig, CircuitState, LlmResponse, ProviderClient, ResilienceConfig, Result,
    SendOptions, Svalinn, SvalinnError,
};

struct EchoProvider {
    id: &'static str,
    calls: AtomicU32,
}

impl EchoProvider {
    fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ProviderClient for EchoProvider {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn send(&self, prompt: &str, options: &SendOptions) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResponse::new(
            format!("echo: {prompt}"),
            &options.model,
            self.id,
        ))
    }
}

fn gateway_with(providers: &[Arc<EchoProvider>]) -> Svalinn {
    let mut builder = Svalinn::builder();
    for p in providers {
        builder = builder.provider(Arc::clone(p) as Arc<dyn ProviderClient>);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn send_routes_to_the_named_provider() {
    let openai = EchoProvider::new("openai");
    let groq = EchoProvider::new("groq");
    let gateway = gateway_with(&[Arc::clone(&openai), Arc::clone(&groq)]);

    let response = gateway
        .send("groq", "hello", &SendOptions::new("llama-3"))
        .await
        .unwrap();
    assert_eq!(response.provider_id(), "groq");
    assert_eq!(response.content(), "echo: hello");
    assert_eq!(groq.calls.load(Ordering::SeqCst), 1);
    assert_eq!(openai.calls.load(Ordering::SeqCst), 0);

    gateway.shutdown();
}

#[tokio::test]
async fn unknown_provider_is_a_configuration_error() {
    let gateway = gateway_with(&[EchoProvider::new("openai")]);

    let err = gateway
        .send("nope", "hello", &SendOptions::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, SvalinnError::Configuration(_)));

    gateway.shutdown();
}

#[tokio::test]
async fn executors_are_created_once_per_provider() {
    let gateway = gateway_with(&[EchoProvider::new("openai")]);

    let a = gateway.executor("openai").unwrap();
    let b = gateway.executor("openai").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    gateway.shutdown();
}

#[tokio::test]
async fn fresh_providers_report_healthy() {
    let gateway = gateway_with(&[EchoProvider::new("openai")]);

    assert!(gateway.is_healthy("openai").unwrap());
    assert_eq!(
        gateway.circuit_state("openai").unwrap(),
        CircuitState::Closed
    );
    assert!(gateway.is_healthy("missing").is_err());

    gateway.shutdown();
}

#[tokio::test]
async fn cache_is_shared_across_sends() {
    let provider = EchoProvider::new("openai");
    let gateway = gateway_with(&[Arc::clone(&provider)]);
    let options = SendOptions::new("gpt-4o");

    gateway.send("openai", "same prompt", &options).await.unwrap();
    let second = gateway.send("openai", "same prompt", &options).await.unwrap();
    assert!(second.from_cache());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let stats = gateway.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    gateway.shutdown();
}

#[tokio::test]
async fn send_after_shutdown_is_rejected() {
    let gateway = gateway_with(&[EchoProvider::new("openai")]);
    gateway
        .send("openai", "warm up", &SendOptions::new("m"))
        .await
        .unwrap();

    gateway.shutdown();
    gateway.shutdown(); // idempotent

    let err = gateway
        .send("openai", "too late", &SendOptions::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, SvalinnError::ShutDown));
}

#[tokio::test]
async fn send_async_starts_work_before_the_future_is_awaited() {
    let provider = EchoProvider::new("openai");
    let gateway = gateway_with(&[Arc::clone(&provider)]);

    let pending = gateway
        .send_async("openai", "hello", &SendOptions::new("m"))
        .unwrap();
    // Unknown providers fail synchronously, before any future exists.
    assert!(
        gateway
            .send_async("nope", "hello", &SendOptions::new("m"))
            .is_err()
    );

    let response = pending.await.unwrap();
    assert_eq!(response.content(), "echo: hello");

    gateway.shutdown();
}

/// First call never returns on its own; later calls echo immediately.
struct StallingProvider {
    calls: AtomicU32,
}

#[async_trait]
impl ProviderClient for StallingProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn send(&self, prompt: &str, _options: &SendOptions) -> Result<LlmResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == 1 {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(LlmResponse::new(format!("echo: {prompt}"), "m", "openai"))
    }
}

#[tokio::test]
async fn dropping_a_pending_response_cancels_the_request() {
    let provider = Arc::new(StallingProvider {
        calls: AtomicU32::new(0),
    });
    // A single bulkhead slot with a short wait: if the dropped request
    // kept running it would hold the slot for a minute and the follow-up
    // send would be rejected into the fallback path.
    let gateway = Svalinn::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ProviderClient>)
        .resilience_config(ResilienceConfig::new().bulkhead(
            BulkheadConfig::new()
                .max_concurrent(1)
                .acquire_timeout(Duration::from_millis(100)),
        ))
        .build()
        .unwrap();

    let pending = gateway
        .send_async("openai", "stalls forever", &SendOptions::new("m"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    drop(pending);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = gateway
        .send("openai", "quick one", &SendOptions::new("m"))
        .await
        .unwrap();
    assert_eq!(response.provider_id(), "openai");
    assert_eq!(response.content(), "echo: quick one");
    // The cancelled request never retried or completed.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    gateway.shutdown();
}

#[tokio::test]
async fn providers_lists_registered_ids() {
    let gateway = gateway_with(&[EchoProvider::new("openai"), EchoProvider::new("groq")]);
    let mut ids = gateway.providers();
    ids.sort_unstable();
    assert_eq!(ids, vec!["groq", "openai"]);

    gateway.shutdown();
}
