//! HTTP client for the backend API

use crate::config::RestConfig;
use crate::wire::{status_error, transport_error, COMPONENT};
use coffer_core::retry::{ErrorKindPredicate, RetryError, RetryExecutorBuilder, TracingObserver};
use coffer_core::types::RetryPolicy;
use coffer_core::{ProviderContext, ProviderError, Result};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use zeroize::Zeroizing;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated client; idempotent requests go through the retry executor
pub(crate) struct RestClient {
    http: reqwest::Client,
    base: Url,
    token: Zeroizing<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RestClient {
    pub(crate) fn new(config: &RestConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ProviderError::invalid_config(COMPONENT, format!("base-url is not a valid URL: {}", e))
                .with_context("base_url", config.base_url.as_str())
        })?;
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ProviderError::internal(COMPONENT, format!("failed to build HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http,
            base,
            token: Zeroizing::new(config.token.clone()),
            timeout: config.timeout(),
            retry: config.retry.clone(),
        })
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base URL; each segment is percent-encoded,
    /// so a `/` inside a secret name stays part of one segment
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::invalid_config(COMPONENT, "base-url cannot carry a path")
                    .with_context("base_url", self.base.as_str())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET and decode a JSON body, retrying transient failures
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &ProviderContext,
        url: Url,
        operation: &'static str,
    ) -> Result<T> {
        self.with_retry(operation, || {
            let request = self.request(ctx, Method::GET, url.clone());
            async move {
                let response = self.send(request, operation).await?;
                response
                    .json::<T>()
                    .await
                    .map_err(|e| transport_error(e, operation))
            }
        })
        .await
    }

    /// DELETE, retrying transient failures
    pub(crate) async fn delete(
        &self,
        ctx: &ProviderContext,
        url: Url,
        operation: &'static str,
    ) -> Result<()> {
        self.with_retry(operation, || {
            let request = self.request(ctx, Method::DELETE, url.clone());
            async move { self.send(request, operation).await.map(|_| ()) }
        })
        .await
    }

    /// PUT a JSON body exactly once
    pub(crate) async fn put_json<B, T>(
        &self,
        ctx: &ProviderContext,
        url: Url,
        body: &B,
        operation: &'static str,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(ctx, Method::PUT, url).json(body);
        let response = self.send(request, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(e, operation))
    }

    fn request(&self, ctx: &ProviderContext, method: Method, url: Url) -> RequestBuilder {
        let timeout = ctx
            .remaining()
            .map_or(self.timeout, |remaining| remaining.min(self.timeout));
        self.http
            .request(method, url)
            .bearer_auth(self.token.as_str())
            .header(REQUEST_ID_HEADER, ctx.request_id())
            .timeout(timeout)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, operation))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            operation = %operation,
            status = status.as_u16(),
            "Backend returned an error status"
        );
        Err(status_error(status, &body, operation))
    }

    async fn with_retry<F, Fut, T>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let executor = RetryExecutorBuilder::new()
            .with_policy(self.retry.clone())
            .with_predicate(ErrorKindPredicate::transient())
            .with_observer(TracingObserver::new(operation))
            .build();

        executor.execute(op).await.map_err(|e: RetryError<ProviderError>| {
            let attempts = e.attempts();
            e.into_inner()
                .with_context("attempts", attempts.to_string())
        })
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
