//! Fault and latency injection

use coffer_core::types::ChaosConfig;
use coffer_core::{ProviderError, Result};
use rand::Rng;

/// Injects latency and random failures into engine calls when enabled
#[derive(Debug, Clone)]
pub struct Chaos {
    config: ChaosConfig,
}

impl Chaos {
    pub fn new(config: ChaosConfig) -> Self {
        Self { config }
    }

    /// Sleep for the simulated latency, then fail with probability `error_rate`
    pub async fn inject(&self, component: &str, operation: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let latency = self.config.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let fail = rand::thread_rng().gen_bool(self.config.error_rate.clamp(0.0, 1.0));
        if fail {
            tracing::debug!(component, operation, "Injecting chaos failure");
            return Err(ProviderError::internal(
                component.to_string(),
                format!("injected failure during {}", operation),
            )
            .with_context("chaos", "true")
            .with_context("operation", operation));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::ErrorKind;

    #[tokio::test]
    async fn test_disabled_chaos_never_fails() {
        let chaos = Chaos::new(ChaosConfig {
            error_rate: 1.0,
            ..ChaosConfig::default()
        });
        assert!(chaos.inject("kms", "encrypt").await.is_ok());
    }

    #[tokio::test]
    async fn test_full_error_rate_always_fails() {
        let chaos = Chaos::new(ChaosConfig {
            enabled: true,
            error_rate: 1.0,
            ..ChaosConfig::default()
        });
        let err = chaos.inject("kms", "encrypt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.context().get("chaos").map(String::as_str), Some("true"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_scaled() {
        let chaos = Chaos::new(ChaosConfig {
            enabled: true,
            error_rate: 0.0,
            latency_multiplier: 3.0,
            base_latency_ms: 100,
        });
        let started = tokio::time::Instant::now();
        chaos.inject("blob", "get_object").await.unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(300));
    }
}
