//! Provider configuration types
//!
//! These types describe the operational parameters a provider consumes:
//! size ceilings, the per-operation QPS table, the eventual-consistency window
//! and chaos injection. Loading them from files or the environment is left to
//! the caller; this module only parses an in-memory document and validates it.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const COMPONENT: &str = "config";

/// Key of the fallback entry in the QPS table
pub const DEFAULT_QPS_KEY: &str = "default";

/// Complete provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfig {
    /// Size ceilings
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Per-operation rate limits
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Eventual-consistency simulation for blob storage
    #[serde(default)]
    pub eventual_consistency: EventualConsistencyConfig,

    /// Fault and latency injection
    #[serde(default)]
    pub chaos: ChaosConfig,
}

impl ProviderConfig {
    /// Parse a YAML document and validate the result
    pub fn from_yaml_str(document: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(document).map_err(|e| {
            ProviderError::invalid_config(COMPONENT, format!("invalid provider configuration: {}", e))
                .with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON value (as handed over by a provider registry) and validate it
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value).map_err(|e| {
            ProviderError::invalid_config(COMPONENT, format!("invalid provider configuration: {}", e))
                .with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.rate_limits.validate()?;
        self.eventual_consistency.validate()?;
        self.chaos.validate()?;
        Ok(())
    }
}

/// Size ceilings applied by the engines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LimitsConfig {
    /// Maximum object size in bytes
    #[serde(default = "default_max_object_size")]
    pub max_object_size_bytes: usize,

    /// Maximum secret value size in bytes
    #[serde(default = "default_max_secret_size")]
    pub max_secret_size_bytes: usize,

    /// Maximum combined size of labels, descriptions and object metadata in bytes
    #[serde(default = "default_max_metadata_size")]
    pub max_metadata_size_bytes: usize,

    /// Maximum plaintext accepted by the KMS encrypt operation
    #[serde(default = "default_max_plaintext_size")]
    pub max_plaintext_size_bytes: usize,

    /// Chunk size used when streaming object bodies back to callers
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_object_size_bytes: default_max_object_size(),
            max_secret_size_bytes: default_max_secret_size(),
            max_metadata_size_bytes: default_max_metadata_size(),
            max_plaintext_size_bytes: default_max_plaintext_size(),
            read_chunk_size_bytes: default_read_chunk_size(),
        }
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        let checks = [
            ("max-object-size-bytes", self.max_object_size_bytes),
            ("max-secret-size-bytes", self.max_secret_size_bytes),
            ("max-metadata-size-bytes", self.max_metadata_size_bytes),
            ("max-plaintext-size-bytes", self.max_plaintext_size_bytes),
            ("read-chunk-size-bytes", self.read_chunk_size_bytes),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ProviderError::invalid_config(
                    COMPONENT,
                    format!("limits.{} must be greater than zero", field),
                ));
            }
        }
        Ok(())
    }
}

fn default_max_object_size() -> usize {
    64 * 1024 * 1024 // 64 MB
}
fn default_max_secret_size() -> usize {
    64 * 1024 // 64 KB
}
fn default_max_metadata_size() -> usize {
    8 * 1024 // 8 KB
}
fn default_max_plaintext_size() -> usize {
    64 * 1024 // 64 KB
}
fn default_read_chunk_size() -> usize {
    64 * 1024 // 64 KB
}

/// Per-(operation, tenant) QPS ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    /// Length of the fixed counting window in milliseconds
    #[serde(default = "default_rate_window")]
    pub window_ms: u64,

    /// Ceiling per operation name; the `default` entry applies to unlisted operations
    #[serde(default)]
    pub qps: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_rate_window(),
            qps: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Resolve the ceiling for an operation, falling back to `default`
    pub fn limit_for(&self, operation: &str) -> Option<u32> {
        self.qps
            .get(operation)
            .or_else(|| self.qps.get(DEFAULT_QPS_KEY))
            .copied()
    }

    /// Window as a duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "rate-limits.window-ms must be greater than zero",
            ));
        }
        if let Some((operation, _)) = self.qps.iter().find(|(_, limit)| **limit == 0) {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("rate-limits.qps.{} must be greater than zero", operation),
            )
            .with_context("operation", operation.as_str()));
        }
        Ok(())
    }
}

fn default_rate_window() -> u64 {
    1000 // 1 second
}

/// Eventual-consistency simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventualConsistencyConfig {
    /// Visibility delay applied to puts and deletes; zero disables staging
    #[serde(default)]
    pub window_ms: u64,

    /// Interval of the background sweep that commits due mutations
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl Default for EventualConsistencyConfig {
    fn default() -> Self {
        Self {
            window_ms: 0,
            sweep_interval_ms: default_sweep_interval(),
        }
    }
}

impl EventualConsistencyConfig {
    /// Whether mutations are staged at all
    pub fn is_enabled(&self) -> bool {
        self.window_ms > 0
    }

    /// Visibility delay as a duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Sweep interval as a duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.is_enabled() && self.sweep_interval_ms == 0 {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "eventual-consistency.sweep-interval-ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_sweep_interval() -> u64 {
    250
}

/// Fault and latency injection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChaosConfig {
    /// Master toggle
    #[serde(default)]
    pub enabled: bool,

    /// Probability in [0, 1] that a call fails with an injected error
    #[serde(default)]
    pub error_rate: f64,

    /// Multiplier applied to the base latency of every call
    #[serde(default = "default_latency_multiplier")]
    pub latency_multiplier: f64,

    /// Base simulated latency per call in milliseconds
    #[serde(default)]
    pub base_latency_ms: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            error_rate: 0.0,
            latency_multiplier: default_latency_multiplier(),
            base_latency_ms: 0,
        }
    }
}

impl ChaosConfig {
    /// Simulated latency for one call
    pub fn latency(&self) -> Duration {
        let millis = self.base_latency_ms as f64 * self.latency_multiplier;
        Duration::from_millis(millis.max(0.0) as u64)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("chaos.error-rate must be within [0, 1], got {}", self.error_rate),
            ));
        }
        if !self.latency_multiplier.is_finite() || self.latency_multiplier < 0.0 {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!(
                    "chaos.latency-multiplier must be a non-negative number, got {}",
                    self.latency_multiplier
                ),
            ));
        }
        Ok(())
    }
}

fn default_latency_multiplier() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.limits.max_secret_size_bytes, 64 * 1024);
        assert_eq!(config.rate_limits.window_ms, 1000);
        assert!(!config.eventual_consistency.is_enabled());
        assert!(!config.chaos.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
limits:
  max-object-size-bytes: 1024
rate-limits:
  window-ms: 500
  qps:
    default: 100
    encrypt: 5
eventual-consistency:
  window-ms: 200
chaos:
  enabled: true
  error-rate: 0.25
  latency-multiplier: 2.0
"#;
        let config = ProviderConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.limits.max_object_size_bytes, 1024);
        assert_eq!(config.limits.max_secret_size_bytes, 64 * 1024);
        assert_eq!(config.rate_limits.limit_for("encrypt"), Some(5));
        assert_eq!(config.rate_limits.limit_for("decrypt"), Some(100));
        assert_eq!(config.eventual_consistency.window(), Duration::from_millis(200));
        assert_eq!(config.eventual_consistency.sweep_interval_ms, 250);
        assert!(config.chaos.enabled);
    }

    #[test]
    fn test_limit_without_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limit_for("encrypt"), None);
    }

    #[test]
    fn test_invalid_error_rate() {
        let yaml = "chaos:\n  enabled: true\n  error-rate: 1.5\n";
        let err = ProviderConfig::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.message().contains("error-rate"));
    }

    #[test]
    fn test_zero_qps_rejected() {
        let yaml = "rate-limits:\n  qps:\n    sign: 0\n";
        let err = ProviderConfig::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(err.context().get("operation").map(String::as_str), Some("sign"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ProviderConfig::from_yaml_str("limits: [").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_from_json_null_is_default() {
        let config = ProviderConfig::from_json_value(serde_json::Value::Null).unwrap();
        assert_eq!(config.limits.max_object_size_bytes, default_max_object_size());
    }

    #[test]
    fn test_chaos_latency() {
        let chaos = ChaosConfig {
            enabled: true,
            error_rate: 0.0,
            latency_multiplier: 3.0,
            base_latency_ms: 10,
        };
        assert_eq!(chaos.latency(), Duration::from_millis(30));
    }
}
