//! REST adapter against a mock backend

mod common;

use coffer_core::provider::LifecycleState;
use coffer_core::types::{ListSecretsRequest, PageRequest, PutSecretOptions, RetryPolicy};
use coffer_core::{ErrorKind, Provider, ProviderContext, ProviderRegistry, SecretStore};
use coffer_rest::{register, RestProvider};
use common::{
    assert_kind, config_for, init_tracing, ready_provider, secret_body, CREATED_AT, TOKEN,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_init_validates_token() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/self"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "bad token" })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RestProvider::new(config_for(&server)).unwrap();
    let ctx = ProviderContext::new("tenant-a");
    assert_kind(provider.init(&ctx).await, ErrorKind::Unauthenticated);
    assert_eq!(provider.lifecycle_state(), LifecycleState::Created);

    let store = provider.secret_store().unwrap();
    assert_kind(store.get_secret(&ctx, "db", None).await, ErrorKind::Internal);
    assert!(!provider.health(&ctx).await.unwrap().is_healthy());
}

#[tokio::test]
async fn test_init_and_shutdown() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    assert_eq!(provider.lifecycle_state(), LifecycleState::Ready);
    provider.init(&ctx).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "version": "1.4.2" })),
        )
        .mount(&server)
        .await;
    let health = provider.health(&ctx).await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.details.get("backend_version").map(String::as_str), Some("1.4.2"));

    provider.shutdown(&ctx).await.unwrap();
    assert_eq!(provider.lifecycle_state(), LifecycleState::ShutDown);
    assert_kind(
        provider.secret_store().unwrap().get_secret(&ctx, "db", None).await,
        ErrorKind::Internal,
    );
    assert_kind(provider.init(&ctx).await, ErrorKind::Internal);
}

#[tokio::test]
async fn test_put_get_delete_with_labels() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    let store = provider.secret_store().unwrap();

    Mock::given(method("PUT"))
        .and(path("/v1/secrets/db-password"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(body_partial_json(json!({
            "value": "aHVudGVyMg==",
            "tags": ["env:prod", "owner:payments"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "db-password",
            "version": "3",
            "created_at": CREATED_AT,
            "tags": ["env:prod", "owner:payments"],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = store
        .put_secret(
            &ctx,
            "db-password",
            "hunter2".into(),
            PutSecretOptions::default()
                .with_label("env", "prod")
                .with_label("owner", "payments"),
        )
        .await
        .unwrap();
    assert_eq!(info.version, "3");
    assert!(info.is_latest);
    assert_eq!(info.labels.get("owner").map(String::as_str), Some("payments"));

    Mock::given(method("GET"))
        .and(path("/v1/secrets/db-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(
            "db-password",
            "3",
            "aHVudGVyMg==",
            &["env:prod", "owner:payments"],
        )))
        .mount(&server)
        .await;

    let secret = store.get_secret(&ctx, "db-password", None).await.unwrap();
    assert_eq!(secret.value.as_str(), Some("hunter2"));
    assert_eq!(secret.version, "3");
    assert_eq!(secret.labels.get("env").map(String::as_str), Some("prod"));

    Mock::given(method("DELETE"))
        .and(path("/v1/secrets/db-password"))
        .and(query_param("version", "2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    store
        .delete_secret(&ctx, "db-password", Some("2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_explicit_version_and_encoded_name() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    let store = provider.secret_store().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/secrets/app%2Fdb"))
        .and(query_param("version", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(
            "app/db",
            "v1",
            "b2xk",
            &[],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let secret = store.get_secret(&ctx, "app/db", Some("v1")).await.unwrap();
    assert_eq!(secret.name, "app/db");
    assert_eq!(secret.value.as_str(), Some("old"));
    assert!(secret.labels.is_empty());
}

#[tokio::test]
async fn test_get_retries_transient_failures() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/secrets/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/flaky"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(
            "flaky", "1", "eA==", &[],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let secret = provider
        .secret_store()
        .unwrap()
        .get_secret(&ctx, "flaky", None)
        .await
        .unwrap();
    assert_eq!(secret.value.as_str(), Some("x"));
}

#[tokio::test]
async fn test_retries_stop_after_max_attempts() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/v1/secrets/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = provider
        .secret_store()
        .unwrap()
        .delete_secret(&ctx, "down", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(err.context().get("attempts").map(String::as_str), Some("3"));
    assert_eq!(err.context().get("status").map(String::as_str), Some("502"));
}

#[tokio::test]
async fn test_put_is_never_retried() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;

    Mock::given(method("PUT"))
        .and(path("/v1/secrets/once"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider
        .secret_store()
        .unwrap()
        .put_secret(&ctx, "once", "x".into(), PutSecretOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_non_retryable_statuses_surface_immediately() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    let store = provider.secret_store().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/secrets/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "no such secret" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/bad"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/secrets/taken"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let err = store.get_secret(&ctx, "missing", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.message().contains("no such secret"));
    assert_kind(store.get_secret(&ctx, "bad", None).await, ErrorKind::InvalidConfig);
    assert_kind(
        store.get_secret(&ctx, "forbidden", None).await,
        ErrorKind::PermissionDenied,
    );
    assert_kind(
        store
            .put_secret(
                &ctx,
                "taken",
                "x".into(),
                PutSecretOptions::default().with_version("1"),
            )
            .await,
        ErrorKind::AlreadyExists,
    );
}

#[tokio::test]
async fn test_request_timeout_is_unavailable() {
    init_tracing();
    let server = MockServer::start().await;
    common::mock_token_ok(&server).await;
    let provider = RestProvider::new(
        config_for(&server)
            .with_timeout(Duration::from_millis(100))
            .with_retry(RetryPolicy::no_retry()),
    )
    .unwrap();
    let ctx = ProviderContext::new("tenant-a");
    provider.init(&ctx).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/secrets/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = provider
        .secret_store()
        .unwrap()
        .get_secret(&ctx, "slow", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(err.context().get("timeout").map(String::as_str), Some("true"));
}

#[tokio::test]
async fn test_unsupported_operations_are_reported() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    let store = provider.secret_store().unwrap();

    let err = store.rotate_secret(&ctx, "db").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(err.context().get("operation").map(String::as_str), Some("rotate_secret"));
    assert_kind(
        store.list_versions(&ctx, "db", PageRequest::default()).await,
        ErrorKind::Unsupported,
    );
    assert_kind(
        store
            .update_secret_metadata(&ctx, "db", Default::default())
            .await,
        ErrorKind::Unsupported,
    );
}

#[tokio::test]
async fn test_unsupported_operations_follow_lifecycle() {
    let server = MockServer::start().await;
    let provider = RestProvider::new(config_for(&server)).unwrap();
    let ctx = ProviderContext::new("tenant-a");
    let store = provider.secret_store().unwrap();

    assert_kind(store.rotate_secret(&ctx, "db").await, ErrorKind::Internal);
    assert_kind(
        store.list_versions(&ctx, "db", PageRequest::default()).await,
        ErrorKind::Internal,
    );
    assert_kind(
        store
            .update_secret_metadata(&ctx, "db", Default::default())
            .await,
        ErrorKind::Internal,
    );

    common::mock_token_ok(&server).await;
    provider.init(&ctx).await.unwrap();
    assert_kind(store.rotate_secret(&ctx, "db").await, ErrorKind::Unsupported);

    provider.shutdown(&ctx).await.unwrap();
    assert_kind(store.rotate_secret(&ctx, "db").await, ErrorKind::Internal);
}

#[tokio::test]
async fn test_list_pages_and_filters_labels() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    let store = provider.secret_store().unwrap();

    let summary = |name: &str, tags: &[&str]| {
        json!({
            "name": name,
            "latest_version": "1",
            "version_count": 1,
            "tags": tags,
            "updated_at": CREATED_AT,
        })
    };

    Mock::given(method("GET"))
        .and(path("/v1/secrets"))
        .and(query_param("prefix", "app/"))
        .and(query_param("page_size", "2"))
        .and(query_param("page_token", "next-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secrets": [summary("app/c", &["env:prod"])],
            "next_page_token": "",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets"))
        .and(query_param("prefix", "app/"))
        .and(query_param("page_size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secrets": [summary("app/a", &["env:prod"]), summary("app/b", &["env:dev"])],
            "next_page_token": "next-1",
        })))
        .mount(&server)
        .await;

    let first = store
        .list_secrets(
            &ctx,
            ListSecretsRequest::default()
                .with_prefix("app/")
                .with_label("env", "prod")
                .with_page(PageRequest::first(2)),
        )
        .await
        .unwrap();
    let names: Vec<_> = first.items.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["app/a"]);
    assert_eq!(first.next_token.as_deref(), Some("next-1"));

    let second = store
        .list_secrets(
            &ctx,
            ListSecretsRequest::default()
                .with_prefix("app/")
                .with_label("env", "prod")
                .with_page(PageRequest::after("next-1", 2)),
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].name, "app/c");
    assert!(second.next_token.is_none());
}

#[tokio::test]
async fn test_invalid_labels_fail_before_any_request() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert_kind(
        provider
            .secret_store()
            .unwrap()
            .put_secret(
                &ctx,
                "db",
                "x".into(),
                PutSecretOptions::default().with_label("a:b", "c"),
            )
            .await,
        ErrorKind::InvalidConfig,
    );
}

#[tokio::test]
async fn test_invalid_names_fail_before_any_request() {
    let server = MockServer::start().await;
    let (provider, ctx) = ready_provider(&server).await;
    let store = provider.secret_store().unwrap();

    for verb in ["PUT", "GET", "DELETE"] {
        Mock::given(method(verb))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    }

    let err = store
        .put_secret(&ctx, "has space;semi", "x".into(), PutSecretOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert_eq!(err.context().get("name").map(String::as_str), Some("has space;semi"));

    let too_long = "x".repeat(600);
    assert_kind(store.get_secret(&ctx, &too_long, None).await, ErrorKind::InvalidConfig);
    assert_kind(store.delete_secret(&ctx, "", None).await, ErrorKind::InvalidConfig);
}

#[tokio::test]
async fn test_registry_creates_rest_providers() {
    init_tracing();
    let server = MockServer::start().await;
    common::mock_token_ok(&server).await;

    let mut registry = ProviderRegistry::new();
    register(&mut registry);
    assert!(registry.contains("rest"));

    let provider = registry
        .create(
            "rest",
            json!({ "base-url": server.uri(), "token": TOKEN, "timeout-ms": 2000 }),
        )
        .unwrap();
    assert_eq!(provider.info().name, "rest");
    assert!(provider.secret_store().is_some());
    assert!(provider.kms().is_none());
    provider.init(&ProviderContext::new("tenant-a")).await.unwrap();

    let bad = registry.create("rest", json!({ "base-url": "ftp://nowhere", "token": TOKEN }));
    assert_eq!(bad.err().map(|e| e.kind()), Some(ErrorKind::InvalidConfig));
}
