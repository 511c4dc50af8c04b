//! Named provider factories

use crate::error::{ProviderError, Result};
use crate::provider::traits::Provider;
use std::collections::BTreeMap;
use std::sync::Arc;

const COMPONENT: &str = "registry";

/// Factory for creating providers from untyped settings
pub trait ProviderFactory: Send + Sync {
    /// Registry name of the provider
    fn name(&self) -> &'static str;

    /// Create a new provider instance; invalid settings yield `InvalidConfig`
    fn create(&self, settings: serde_json::Value) -> Result<Arc<dyn Provider>>;
}

/// Registry of provider factories by name
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a factory with the same name is replaced
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        let name = factory.name().to_string();
        if self.factories.insert(name.clone(), factory).is_some() {
            tracing::debug!(provider = %name, "Replaced provider factory");
        }
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Create a provider by name
    pub fn create(&self, name: &str, settings: serde_json::Value) -> Result<Arc<dyn Provider>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            ProviderError::not_found(COMPONENT, format!("no provider registered as '{}'", name))
                .with_context("provider", name)
        })?;
        tracing::debug!(provider = %name, "Creating provider");
        factory.create(settings)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProviderContext;
    use crate::error::ErrorKind;
    use crate::provider::capabilities::Capabilities;
    use crate::provider::traits::{HealthStatus, ProviderInfo};
    use async_trait::async_trait;

    struct NullProvider {
        info: ProviderInfo,
    }

    #[async_trait]
    impl Provider for NullProvider {
        fn info(&self) -> &ProviderInfo {
            &self.info
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::none()
        }

        async fn init(&self, _ctx: &ProviderContext) -> Result<()> {
            Ok(())
        }

        async fn health(&self, ctx: &ProviderContext) -> Result<HealthStatus> {
            Ok(HealthStatus::healthy(ctx.now()))
        }

        async fn shutdown(&self, _ctx: &ProviderContext) -> Result<()> {
            Ok(())
        }
    }

    struct NullFactory;

    impl ProviderFactory for NullFactory {
        fn name(&self) -> &'static str {
            "null"
        }

        fn create(&self, settings: serde_json::Value) -> Result<Arc<dyn Provider>> {
            if !settings.is_null() && !settings.is_object() {
                return Err(ProviderError::invalid_config(COMPONENT, "settings must be an object"));
            }
            Ok(Arc::new(NullProvider {
                info: ProviderInfo::new("null", "0.0.0", "does nothing"),
            }))
        }
    }

    #[test]
    fn test_create_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(NullFactory));

        assert_eq!(registry.names(), vec!["null"]);
        let provider = registry.create("null", serde_json::Value::Null).unwrap();
        assert_eq!(provider.info().name, "null");
        assert!(provider.kms().is_none());
        assert!(provider.secret_store().is_none());
        assert!(provider.blob_storage().is_none());
    }

    #[test]
    fn test_unknown_provider_is_not_found() {
        let registry = ProviderRegistry::new();
        let err = registry.create("vault", serde_json::Value::Null).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_bad_settings_are_invalid_config() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(NullFactory));
        let err = registry.create("null", serde_json::json!(42)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
