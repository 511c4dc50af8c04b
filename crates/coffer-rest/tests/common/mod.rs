//! Common test helpers for coffer-rest integration tests
//!
//! - Tracing setup honouring `RUST_LOG`
//! - Mock backend endpoints
//! - Providers wired to a mock server with a fast retry policy

#![allow(dead_code)]

use coffer_core::types::{RetryPolicy, RetryStrategy};
use coffer_core::{ErrorKind, Provider, ProviderContext, Result};
use coffer_rest::{RestConfig, RestProvider};
use serde_json::json;
use std::sync::Once;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "s.test-token";
pub const CREATED_AT: &str = "2026-01-01T00:00:00Z";

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Three attempts a few milliseconds apart
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        strategy: RetryStrategy::FixedDelay,
        backoff_multiplier: 1.0,
        initial_delay_ms: 5,
        max_delay_ms: 20,
    }
}

pub fn config_for(server: &MockServer) -> RestConfig {
    RestConfig::new(server.uri(), TOKEN)
        .with_timeout(Duration::from_secs(5))
        .with_retry(fast_retry())
}

/// Token endpoint accepting the test token
pub async fn mock_token_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/self"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display_name": "ci",
            "expires_at": "2027-01-01T00:00:00Z",
        })))
        .mount(server)
        .await;
}

/// Provider initialized against a mock server that accepts the token
pub async fn ready_provider(server: &MockServer) -> (RestProvider, ProviderContext) {
    init_tracing();
    mock_token_ok(server).await;
    let provider = RestProvider::new(config_for(server)).expect("valid test configuration");
    let ctx = ProviderContext::new("tenant-a");
    provider.init(&ctx).await.expect("provider init");
    (provider, ctx)
}

/// JSON body of a stored secret as the backend returns it
pub fn secret_body(name: &str, version: &str, value_b64: &str, tags: &[&str]) -> serde_json::Value {
    json!({
        "name": name,
        "version": version,
        "value": value_b64,
        "created_at": CREATED_AT,
        "tags": tags,
        "description": null,
    })
}

pub fn assert_kind<T: std::fmt::Debug>(result: Result<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {} error, got Ok({:?})", kind, value),
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {}", err),
    }
}
