//! Tests for metrics emission.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and
//! assert on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use svalinn::cache::ResponseCache;
use svalinn::executor::ResilientExecutor;
use svalinn::{
    CacheConfig, LlmResponse, ProviderClient, ResilienceConfig, Result, RetryConfig, SendOptions,
    SvalinnError, telemetry,
};

struct OkProvider;

#[async_trait]
impl ProviderClient for OkProvider {
    fn provider_id(&self) -> &str {
        "ok"
    }

    async fn send(&self, _prompt: &str, _options: &SendOptions) -> Result<LlmResponse> {
        Ok(LlmResponse::new("hi", "m", "ok"))
    }
}

struct FailingProvider;

#[async_trait]
impl ProviderClient for FailingProvider {
    fn provider_id(&self) -> &str {
        "failing"
    }

    async fn send(&self, _prompt: &str, _options: &SendOptions) -> Result<LlmResponse> {
        Err(SvalinnError::Server {
            provider: "failing".into(),
            status: 500,
            message: "down".into(),
        })
    }
}

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn executor(client: Arc<dyn ProviderClient>) -> ResilientExecutor {
    let config = ResilienceConfig::new().retry(
        RetryConfig::new()
            .max_attempts(2)
            .base_delay(Duration::from_millis(1)),
    );
    ResilientExecutor::new(client, Arc::new(ResponseCache::new(&CacheConfig::default())), &config)
}

/// Runs async code within a local recorder scope on the multi-thread
/// runtime. `block_in_place` keeps the sync `with_local_recorder`
/// closure on the current thread while `block_on` drives the async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_request_records_request_and_cache_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let exec = executor(Arc::new(OkProvider));
                exec.send("hello", &SendOptions::new("m")).await?;
                exec.send("hello", &SendOptions::new("m")).await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn terminal_failure_records_retries_and_fallback() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let exec = executor(Arc::new(FailingProvider));
                exec.send("mine iron", &SendOptions::new("m")).await
            })
        })
    });
    assert_eq!(result.unwrap().provider_id(), "fallback");

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    // 2 attempts means 1 retry.
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::FALLBACKS_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let exec = executor(Arc::new(OkProvider));
    let response = exec.send("hello", &SendOptions::new("m")).await.unwrap();
    assert_eq!(response.content(), "hi");
}
