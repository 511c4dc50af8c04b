//! Adapter configuration

use coffer_core::types::RetryPolicy;
use coffer_core::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const COMPONENT: &str = "rest-config";

/// Connection settings for a REST secret backend
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RestConfig {
    /// Base URL of the backend, e.g. `https://secrets.internal:8200`
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(skip_serializing)]
    pub token: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry policy for idempotent requests
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("timeout_ms", &self.timeout_ms)
            .field("retry", &self.retry)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout_ms: default_timeout_ms(),
            retry: RetryPolicy::default(),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parse untyped registry settings and validate them
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value).map_err(|e| {
            ProviderError::invalid_config(COMPONENT, format!("invalid REST adapter settings: {}", e))
                .with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ProviderError::invalid_config(COMPONENT, format!("base-url is not a valid URL: {}", e))
                .with_context("base_url", self.base_url.as_str())
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "base-url must be an absolute http or https URL",
            )
            .with_context("base_url", self.base_url.as_str()));
        }
        if self.token.trim().is_empty() {
            return Err(ProviderError::invalid_config(COMPONENT, "token must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "timeout-ms must be greater than zero",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "retry.max-attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("coffer-rest/{}", env!("CARGO_PKG_VERSION"))
}
