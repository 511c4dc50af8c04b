//! The memory provider and its registry factory

use crate::blob::MemoryBlobStorage;
use crate::kms::MemoryKms;
use crate::runtime::{Runtime, PROVIDER_NAME};
use crate::secrets::MemorySecretStore;
use async_trait::async_trait;
use coffer_core::provider::{
    BlobCapabilities, HealthStatus, KmsCapabilities, LifecycleState, SecretCapabilities,
};
use coffer_core::types::{KeyAlgorithm, ProviderConfig};
use coffer_core::{
    BlobStorage, Capabilities, KmsEngine, Provider, ProviderContext, ProviderFactory, ProviderInfo,
    ProviderRegistry, Result, SecretStore,
};
use std::sync::Arc;

const COMPONENT: &str = "provider";

/// Reference provider keeping keys, secrets and objects in process memory
///
/// Every instance owns its own state, rate limiter, eventual-consistency
/// staging and sweep task; nothing is shared between instances.
pub struct MemoryProvider {
    info: ProviderInfo,
    rt: Arc<Runtime>,
    kms: MemoryKms,
    secrets: MemorySecretStore,
    blob: MemoryBlobStorage,
}

impl MemoryProvider {
    /// Create a provider from a validated configuration
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let rt = Arc::new(Runtime::new(config));
        Ok(Self {
            info: ProviderInfo::new(
                PROVIDER_NAME,
                env!("CARGO_PKG_VERSION"),
                "In-memory KMS, secret store and blob storage",
            ),
            kms: MemoryKms::new(rt.clone()),
            secrets: MemorySecretStore::new(rt.clone()),
            blob: MemoryBlobStorage::new(rt.clone()),
            rt,
        })
    }

    /// Create a provider from untyped settings (`null` means defaults)
    pub fn from_settings(settings: serde_json::Value) -> Result<Self> {
        Self::new(ProviderConfig::from_json_value(settings)?)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.rt.config
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.rt.lifecycle.state()
    }

    /// Concrete blob engine, for signed URL verification
    pub fn blob(&self) -> &MemoryBlobStorage {
        &self.blob
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
            .with_kms(KmsCapabilities {
                algorithms: vec![
                    KeyAlgorithm::Aes256Gcm,
                    KeyAlgorithm::XChaCha20Poly1305,
                    KeyAlgorithm::EcdsaP256Sha256,
                    KeyAlgorithm::Ed25519,
                ],
                key_rotation: true,
                key_deletion: true,
                data_keys: true,
            })
            .with_secrets(SecretCapabilities {
                labels: true,
                version_listing: true,
                rotation: true,
                metadata_updates: true,
            })
            .with_blob(BlobCapabilities {
                range_reads: true,
                conditional_reads: true,
                multipart: true,
                signed_urls: true,
                copy: true,
                eventual_consistency: self.rt.config.eventual_consistency.is_enabled(),
            })
    }

    async fn init(&self, ctx: &ProviderContext) -> Result<()> {
        self.rt.set_clock(ctx.clock().clone());
        if !self.rt.lifecycle.mark_ready(COMPONENT)? {
            tracing::debug!("Memory provider already initialized");
            return Ok(());
        }
        self.blob.start_sweeper();
        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            eventual_consistency = self.rt.config.eventual_consistency.is_enabled(),
            chaos = self.rt.config.chaos.enabled,
            "Memory provider initialized"
        );
        Ok(())
    }

    async fn health(&self, ctx: &ProviderContext) -> Result<HealthStatus> {
        let now = ctx.now();
        let state = self.rt.lifecycle.state();
        if state != LifecycleState::Ready {
            return Ok(HealthStatus::unhealthy(now, format!("provider is {}", state))
                .with_detail("lifecycle", state.to_string()));
        }

        let (objects, staged, uploads) = self.blob.stats().await;
        Ok(HealthStatus::healthy(now)
            .with_detail("lifecycle", state.to_string())
            .with_detail("objects", objects.to_string())
            .with_detail("staged_changes", staged.to_string())
            .with_detail("open_uploads", uploads.to_string()))
    }

    async fn shutdown(&self, ctx: &ProviderContext) -> Result<()> {
        let previous = self.rt.lifecycle.mark_shut_down();
        self.blob.stop_sweeper();
        if previous != LifecycleState::ShutDown {
            tracing::info!(tenant_id = %ctx.tenant_id(), "Memory provider shut down");
        }
        Ok(())
    }

    fn kms(&self) -> Option<&dyn KmsEngine> {
        Some(&self.kms)
    }

    fn secret_store(&self) -> Option<&dyn SecretStore> {
        Some(&self.secrets)
    }

    fn blob_storage(&self) -> Option<&dyn BlobStorage> {
        Some(&self.blob)
    }
}

/// Registry factory for [`MemoryProvider`]
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryProviderFactory;

impl ProviderFactory for MemoryProviderFactory {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn create(&self, settings: serde_json::Value) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(MemoryProvider::from_settings(settings)?))
    }
}

/// Register the memory provider under `"memory"`
pub fn register(registry: &mut ProviderRegistry) {
    registry.register(Arc::new(MemoryProviderFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::provider::Capability;

    #[test]
    fn test_capabilities_cover_all_families() {
        let provider = MemoryProvider::new(ProviderConfig::default()).unwrap();
        let caps = provider.capabilities();
        assert!(caps.supports(Capability::Kms));
        assert!(caps.supports(Capability::Algorithm(KeyAlgorithm::Ed25519)));
        assert!(caps.supports(Capability::SecretRotation));
        assert!(caps.supports(Capability::Multipart));
        assert!(!caps.supports(Capability::EventualConsistency));
    }

    #[test]
    fn test_factory_rejects_bad_settings() {
        let result = MemoryProviderFactory.create(serde_json::json!({ "limits": "nope" }));
        assert!(result.is_err());
    }
}
