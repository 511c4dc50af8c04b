//! The REST provider and its registry factory

use crate::client::RestClient;
use crate::config::RestConfig;
use crate::store::{RestSecretStore, PROVIDER_NAME};
use crate::wire::{HealthDto, TokenDto, COMPONENT};
use async_trait::async_trait;
use coffer_core::provider::{HealthStatus, Lifecycle, LifecycleState, SecretCapabilities};
use coffer_core::{
    Capabilities, ErrorKind, Provider, ProviderContext, ProviderError, ProviderFactory,
    ProviderInfo, ProviderRegistry, Result, SecretStore,
};
use std::sync::Arc;

/// Secret-store-only provider talking to a remote secret-management service
pub struct RestProvider {
    info: ProviderInfo,
    config: RestConfig,
    client: Arc<RestClient>,
    lifecycle: Arc<Lifecycle>,
    secrets: RestSecretStore,
}

impl RestProvider {
    pub fn new(config: RestConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(RestClient::new(&config)?);
        let lifecycle = Arc::new(Lifecycle::new());
        Ok(Self {
            info: ProviderInfo::new(
                PROVIDER_NAME,
                env!("CARGO_PKG_VERSION"),
                "Secret store adapter for REST secret-management services",
            ),
            secrets: RestSecretStore::new(client.clone(), lifecycle.clone()),
            config,
            client,
            lifecycle,
        })
    }

    pub fn from_settings(settings: serde_json::Value) -> Result<Self> {
        Self::new(RestConfig::from_json_value(settings)?)
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Check the token against the backend; rejected credentials are `Unauthenticated`
    async fn verify_token(&self, ctx: &ProviderContext) -> Result<TokenDto> {
        let url = self.client.url(&["v1", "auth", "token", "self"])?;
        self.client
            .get_json::<TokenDto>(ctx, url, "verify_token")
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::PermissionDenied {
                    ProviderError::unauthenticated(COMPONENT, "backend rejected the configured token")
                        .with_context("base_url", self.client.base_url().as_str())
                        .with_source(e)
                } else {
                    e
                }
            })
    }
}

#[async_trait]
impl Provider for RestProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().with_secrets(SecretCapabilities {
            labels: true,
            version_listing: false,
            rotation: false,
            metadata_updates: false,
        })
    }

    async fn init(&self, ctx: &ProviderContext) -> Result<()> {
        match self.lifecycle.state() {
            LifecycleState::Ready => {
                tracing::debug!("REST provider already initialized");
                return Ok(());
            }
            LifecycleState::ShutDown => {
                return Err(ProviderError::internal(
                    COMPONENT,
                    "provider cannot be initialized after shutdown",
                ));
            }
            LifecycleState::Created => {}
        }

        ctx.check_deadline(COMPONENT, "init")?;
        let token = self.verify_token(ctx).await?;
        self.lifecycle.mark_ready(COMPONENT)?;
        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            base_url = %self.client.base_url(),
            token_name = ?token.display_name,
            token_expires_at = ?token.expires_at,
            "REST provider initialized"
        );
        Ok(())
    }

    async fn health(&self, ctx: &ProviderContext) -> Result<HealthStatus> {
        let now = ctx.now();
        let state = self.lifecycle.state();
        if state != LifecycleState::Ready {
            return Ok(HealthStatus::unhealthy(now, format!("provider is {}", state))
                .with_detail("lifecycle", state.to_string()));
        }

        let url = self.client.url(&["v1", "health"])?;
        match self.client.get_json::<HealthDto>(ctx, url, "health").await {
            Ok(dto) => {
                let mut status = HealthStatus::healthy(now)
                    .with_detail("lifecycle", state.to_string())
                    .with_detail("backend_status", dto.status.unwrap_or_else(|| "ok".to_string()));
                if let Some(version) = dto.version {
                    status = status.with_detail("backend_version", version);
                }
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(error = %e, "REST backend health probe failed");
                Ok(HealthStatus::unhealthy(now, e.to_string())
                    .with_detail("lifecycle", state.to_string())
                    .with_detail("error_kind", e.kind().as_str()))
            }
        }
    }

    async fn shutdown(&self, ctx: &ProviderContext) -> Result<()> {
        if self.lifecycle.mark_shut_down() != LifecycleState::ShutDown {
            tracing::info!(tenant_id = %ctx.tenant_id(), "REST provider shut down");
        }
        Ok(())
    }

    fn secret_store(&self) -> Option<&dyn SecretStore> {
        Some(&self.secrets)
    }
}

/// Registry factory for [`RestProvider`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RestProviderFactory;

impl ProviderFactory for RestProviderFactory {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn create(&self, settings: serde_json::Value) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(RestProvider::from_settings(settings)?))
    }
}

/// Register the REST provider under `"rest"`
pub fn register(registry: &mut ProviderRegistry) {
    registry.register(Arc::new(RestProviderFactory));
}
