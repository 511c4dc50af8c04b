//! Secret store backed by the REST API

use crate::client::RestClient;
use crate::labels::{labels_to_tags, tags_to_labels};
use crate::wire::{encode_value, ListDto, PutSecretBody, SecretDto, VersionDto, COMPONENT};
use async_trait::async_trait;
use coffer_core::provider::Lifecycle;
use coffer_core::types::{
    labels_match, validate_secret_name, ListSecretsRequest, Page, PageRequest, PutSecretOptions,
    Secret, SecretMetadataUpdate, SecretSummary, SecretValue, SecretVersionInfo,
};
use coffer_core::{AuditEvent, ProviderContext, ProviderError, Result, SecretStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub(crate) const PROVIDER_NAME: &str = "rest";

/// [`SecretStore`] over a remote secret-management service
///
/// Labels travel as `key:value` tags. Version listing, rotation and metadata
/// updates have no remote counterpart and fail with `Unsupported`.
#[derive(Debug)]
pub struct RestSecretStore {
    client: Arc<RestClient>,
    lifecycle: Arc<Lifecycle>,
}

impl RestSecretStore {
    pub(crate) fn new(client: Arc<RestClient>, lifecycle: Arc<Lifecycle>) -> Self {
        Self { client, lifecycle }
    }

    async fn call<T, F>(&self, ctx: &ProviderContext, operation: &'static str, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = ctx.span(COMPONENT, operation);
        let started = Instant::now();
        let result = async {
            self.lifecycle.ensure_ready(COMPONENT, operation)?;
            ctx.check_deadline(COMPONENT, operation)?;
            op.await
        }
        .instrument(span.clone())
        .await;

        ctx.metrics().record_operation(
            operation,
            ctx.tenant_id(),
            started.elapsed(),
            result.is_ok(),
        );
        if let Err(e) = &result {
            span.in_scope(|| {
                tracing::debug!(error_kind = %e.kind(), error = %e, "Operation failed");
            });
        }
        result
    }

    fn audit(&self, ctx: &ProviderContext, action: &str, name: &str) -> AuditEvent {
        AuditEvent::new(ctx, PROVIDER_NAME, action, "secret", name)
    }

    fn secret_url(&self, name: &str, version: Option<&str>) -> Result<reqwest::Url> {
        let mut url = self.client.url(&["v1", "secrets", name])?;
        if let Some(version) = version {
            url.query_pairs_mut().append_pair("version", version);
        }
        Ok(url)
    }
}

#[async_trait]
impl SecretStore for RestSecretStore {
    async fn put_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        value: SecretValue,
        options: PutSecretOptions,
    ) -> Result<SecretVersionInfo> {
        self.call(ctx, "put_secret", async {
            validate_secret_name(name)?;
            let body = PutSecretBody {
                value: encode_value(value.expose()),
                version: options.version.as_deref(),
                tags: labels_to_tags(&options.labels)?,
                description: options.description.as_deref(),
            };
            let url = self.client.url(&["v1", "secrets", name])?;
            let result = self
                .client
                .put_json::<_, VersionDto>(ctx, url, &body, "put_secret")
                .await
                .map(|dto| SecretVersionInfo {
                    name: dto.name,
                    version: dto.version,
                    created_at: dto.created_at,
                    labels: tags_to_labels(&dto.tags),
                    description: dto.description,
                    is_latest: true,
                });

            let mut event = self.audit(ctx, "put_secret", name).with_outcome(&result);
            if let Ok(info) = &result {
                event = event.with_metadata("version", info.version.as_str());
            }
            event.log();
            result
        })
        .await
    }

    async fn get_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        version: Option<&str>,
    ) -> Result<Secret> {
        self.call(ctx, "get_secret", async {
            validate_secret_name(name)?;
            let url = self.secret_url(name, version)?;
            let dto: SecretDto = self.client.get_json(ctx, url, "get_secret").await?;
            let value = dto.decode_value()?;
            Ok(Secret {
                labels: tags_to_labels(&dto.tags),
                value: SecretValue::new(value),
                name: dto.name,
                version: dto.version,
                created_at: dto.created_at,
                description: dto.description,
            })
        })
        .await
    }

    async fn delete_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        version: Option<&str>,
    ) -> Result<()> {
        self.call(ctx, "delete_secret", async {
            validate_secret_name(name)?;
            let url = self.secret_url(name, version)?;
            let result = self.client.delete(ctx, url, "delete_secret").await;
            self.audit(ctx, "delete_secret", name)
                .with_metadata("version", version.unwrap_or("*"))
                .with_outcome(&result)
                .log();
            result
        })
        .await
    }

    async fn list_secrets(
        &self,
        ctx: &ProviderContext,
        request: ListSecretsRequest,
    ) -> Result<Page<SecretSummary>> {
        self.call(ctx, "list_secrets", async {
            let page_size = request.page.page_size()?;
            let mut url = self.client.url(&["v1", "secrets"])?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(prefix) = &request.prefix {
                    query.append_pair("prefix", prefix);
                }
                query.append_pair("page_size", &page_size.to_string());
                if let Some(token) = &request.page.token {
                    query.append_pair("page_token", token);
                }
            }

            let dto: ListDto = self.client.get_json(ctx, url, "list_secrets").await?;
            // The backend cannot filter by tag; narrow the page locally
            let items = dto
                .secrets
                .into_iter()
                .map(|s| SecretSummary {
                    labels: tags_to_labels(&s.tags),
                    name: s.name,
                    latest_version: s.latest_version,
                    version_count: s.version_count,
                    description: s.description,
                    rotation_hook: None,
                    updated_at: s.updated_at,
                })
                .filter(|s| labels_match(&s.labels, &request.labels))
                .collect();

            Ok(Page {
                items,
                next_token: dto.next_page_token.filter(|t| !t.is_empty()),
            })
        })
        .await
    }

    async fn list_versions(
        &self,
        ctx: &ProviderContext,
        _name: &str,
        _page: PageRequest,
    ) -> Result<Page<SecretVersionInfo>> {
        self.call(ctx, "list_versions", async {
            Err(ProviderError::unsupported(COMPONENT, "list_versions"))
        })
        .await
    }

    async fn rotate_secret(&self, ctx: &ProviderContext, _name: &str) -> Result<SecretVersionInfo> {
        self.call(ctx, "rotate_secret", async {
            Err(ProviderError::unsupported(COMPONENT, "rotate_secret"))
        })
        .await
    }

    async fn update_secret_metadata(
        &self,
        ctx: &ProviderContext,
        _name: &str,
        _update: SecretMetadataUpdate,
    ) -> Result<SecretSummary> {
        self.call(ctx, "update_secret_metadata", async {
            Err(ProviderError::unsupported(COMPONENT, "update_secret_metadata"))
        })
        .await
    }
}
