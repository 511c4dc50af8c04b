//! Provider lifecycle, registry and cross-cutting call checks

mod common;

use coffer_core::provider::LifecycleState;
use coffer_core::types::{CreateKeyRequest, KeyUsage, ProviderConfig, PutSecretOptions};
use coffer_core::{ErrorKind, MetricsSink, Provider, ProviderContext, ProviderRegistry};
use coffer_memory::{register, MemoryProvider};
use common::{assert_kind, init_tracing, Fixture};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct RecordingMetrics {
    operations: Mutex<Vec<(String, bool)>>,
    throttled: Mutex<Vec<String>>,
}

impl MetricsSink for RecordingMetrics {
    fn record_operation(&self, operation: &str, _tenant: &str, _duration: Duration, success: bool) {
        self.operations
            .lock()
            .unwrap()
            .push((operation.to_string(), success));
    }

    fn record_throttled(&self, operation: &str, _tenant: &str) {
        self.throttled.lock().unwrap().push(operation.to_string());
    }
}

#[tokio::test]
async fn test_calls_before_init_and_after_shutdown_fail() {
    init_tracing();
    let provider = MemoryProvider::new(ProviderConfig::default()).unwrap();
    let ctx = ProviderContext::new("tenant-a");
    assert_eq!(provider.lifecycle_state(), LifecycleState::Created);

    let kms = provider.kms().unwrap();
    assert_kind(
        kms.create_key(&ctx, CreateKeyRequest::new(KeyUsage::EncryptDecrypt))
            .await,
        ErrorKind::Internal,
    );

    provider.init(&ctx).await.unwrap();
    provider.init(&ctx).await.unwrap();
    assert_eq!(provider.lifecycle_state(), LifecycleState::Ready);
    assert!(provider.health(&ctx).await.unwrap().is_healthy());
    kms.create_key(&ctx, CreateKeyRequest::new(KeyUsage::EncryptDecrypt))
        .await
        .unwrap();

    provider.shutdown(&ctx).await.unwrap();
    provider.shutdown(&ctx).await.unwrap();
    assert_eq!(provider.lifecycle_state(), LifecycleState::ShutDown);
    assert!(!provider.health(&ctx).await.unwrap().is_healthy());
    assert_kind(
        kms.create_key(&ctx, CreateKeyRequest::new(KeyUsage::EncryptDecrypt))
            .await,
        ErrorKind::Internal,
    );
    assert_kind(provider.init(&ctx).await, ErrorKind::Internal);
}

#[tokio::test]
async fn test_registry_creates_memory_providers() {
    init_tracing();
    let mut registry = ProviderRegistry::new();
    register(&mut registry);
    assert!(registry.contains("memory"));
    assert_eq!(registry.names(), vec!["memory"]);

    let provider = registry.create("memory", serde_json::Value::Null).unwrap();
    assert_eq!(provider.info().name, "memory");
    assert!(provider.kms().is_some());
    assert!(provider.secret_store().is_some());
    assert!(provider.blob_storage().is_some());

    let configured = registry
        .create(
            "memory",
            serde_json::json!({ "limits": { "max-secret-size-bytes": 16 } }),
        )
        .unwrap();
    let ctx = ProviderContext::new("tenant-a");
    configured.init(&ctx).await.unwrap();
    assert_kind(
        configured
            .secret_store()
            .unwrap()
            .put_secret(&ctx, "s", vec![0u8; 17].into(), PutSecretOptions::default())
            .await,
        ErrorKind::InvalidConfig,
    );

    let bad = registry.create("memory", serde_json::json!({ "chaos": { "error-rate": 2.0 } }));
    assert_eq!(bad.err().map(|e| e.kind()), Some(ErrorKind::InvalidConfig));
    let unknown = registry.create("vault", serde_json::Value::Null);
    assert_eq!(unknown.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_rate_limit_per_operation_and_tenant() {
    let mut config = ProviderConfig::default();
    config.rate_limits.qps.insert("get_secret".to_string(), 2);
    let fx = Fixture::with_config(config).await;
    let store = fx.provider.secret_store().unwrap();
    store
        .put_secret(&fx.ctx, "hot", "x".into(), PutSecretOptions::default())
        .await
        .unwrap();

    let metrics = Arc::new(RecordingMetrics::default());
    let ctx = fx.ctx.clone().with_metrics(metrics.clone());
    store.get_secret(&ctx, "hot", None).await.unwrap();
    store.get_secret(&ctx, "hot", None).await.unwrap();
    let err = store.get_secret(&ctx, "hot", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Throttled);
    let throttle = err.throttle().expect("throttle details");
    assert_eq!(throttle.attempted, 3);
    assert_eq!(throttle.limit, 2);
    assert_eq!(metrics.throttled.lock().unwrap().as_slice(), ["get_secret"]);

    // Other tenants and other operations have their own counters
    let other = fx.tenant("tenant-b");
    store.get_secret(&other, "hot", None).await.unwrap();
    store
        .put_secret(&ctx, "cold", "y".into(), PutSecretOptions::default())
        .await
        .unwrap();

    // A new window resets the count
    fx.clock.advance(Duration::from_secs(1));
    store.get_secret(&ctx, "hot", None).await.unwrap();

    let operations = metrics.operations.lock().unwrap();
    assert!(operations.iter().any(|(op, ok)| op == "get_secret" && !ok));
    assert!(operations.iter().any(|(op, ok)| op == "put_secret" && *ok));
}

#[tokio::test]
async fn test_expired_deadline_is_unavailable() {
    let fx = Fixture::new().await;
    let store = fx.provider.secret_store().unwrap();

    let expired = fx.ctx.clone().with_deadline(fx.ctx.now());
    let err = store
        .put_secret(&expired, "late", "x".into(), PutSecretOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_kind(store.get_secret(&fx.ctx, "late", None).await, ErrorKind::NotFound);

    let generous = fx.ctx.clone().with_timeout(Duration::from_secs(30));
    store
        .put_secret(&generous, "on-time", "x".into(), PutSecretOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_chaos_failures_are_internal() {
    let mut config = ProviderConfig::default();
    config.chaos.enabled = true;
    config.chaos.error_rate = 1.0;
    let fx = Fixture::with_config(config).await;

    let err = fx
        .provider
        .kms()
        .unwrap()
        .get_key(&fx.ctx, "anything")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.context().get("chaos").map(String::as_str), Some("true"));
}

#[tokio::test]
async fn test_instances_do_not_share_state() {
    let a = Fixture::new().await;
    let b = Fixture::new().await;
    a.provider
        .secret_store()
        .unwrap()
        .put_secret(&a.ctx, "only-in-a", "x".into(), PutSecretOptions::default())
        .await
        .unwrap();
    assert_kind(
        b.provider
            .secret_store()
            .unwrap()
            .get_secret(&b.ctx, "only-in-a", None)
            .await,
        ErrorKind::NotFound,
    );
}
