//! In-memory versioned secret store

use crate::runtime::Runtime;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coffer_core::types::{
    labels_match, paginate, validate_secret_name, ListSecretsRequest, Page, PageRequest,
    PutSecretOptions, RotationHook, Secret, SecretMetadataUpdate, SecretSummary, SecretValue,
    SecretVersionInfo,
};
use coffer_core::{ProviderContext, ProviderError, Result, SecretStore};
use rand::RngCore;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

const COMPONENT: &str = "secrets";

/// Length of values synthesized by `rotate_secret`, in random bytes
const ROTATED_VALUE_BYTES: usize = 32;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]{1,128}$").expect("secret version regex is valid")
});

fn validate_version_label(version: &str) -> Result<()> {
    if !VERSION_RE.is_match(version) {
        return Err(ProviderError::invalid_config(
            COMPONENT,
            "secret version must be 1-128 characters of [A-Za-z0-9._-]",
        )
        .with_context("version", version));
    }
    Ok(())
}

/// Options for the version a rotation writes; the secret must carry a hook
fn rotation_options(
    records: &BTreeMap<String, SecretRecord>,
    name: &str,
) -> Result<PutSecretOptions> {
    let record = records.get(name).ok_or_else(|| not_found(name))?;
    let hook = record.rotation_hook.as_ref().ok_or_else(|| {
        ProviderError::invalid_config(COMPONENT, "secret has no rotation hook")
            .with_context("name", name)
    })?;
    tracing::debug!(
        secret = %name,
        hook_kind = %hook.kind,
        hook_target = %hook.target,
        "Rotating secret"
    );
    Ok(PutSecretOptions {
        labels: record.labels.clone(),
        ..PutSecretOptions::default()
    })
}

fn not_found(name: &str) -> ProviderError {
    ProviderError::not_found(COMPONENT, "secret not found").with_context("name", name)
}

fn version_not_found(name: &str, version: &str) -> ProviderError {
    ProviderError::not_found(COMPONENT, "secret version not found")
        .with_context("name", name)
        .with_context("version", version)
}

struct StoredVersion {
    value: SecretValue,
    created_at: DateTime<Utc>,
    labels: BTreeMap<String, String>,
    description: Option<String>,
    /// Insertion order; breaks created_at ties
    seq: u64,
}

struct SecretRecord {
    versions: HashMap<String, StoredVersion>,
    latest_version: String,
    labels: BTreeMap<String, String>,
    description: Option<String>,
    rotation_hook: Option<RotationHook>,
    /// Next N for generated `v<N>` versions
    next_version: u64,
    next_seq: u64,
    updated_at: DateTime<Utc>,
}

impl SecretRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            versions: HashMap::new(),
            latest_version: String::new(),
            labels: BTreeMap::new(),
            description: None,
            rotation_hook: None,
            next_version: 1,
            next_seq: 0,
            updated_at: now,
        }
    }

    /// Next free generated version
    fn generate_version(&mut self) -> String {
        loop {
            let candidate = format!("v{}", self.next_version);
            self.next_version += 1;
            if !self.versions.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn recompute_latest(&mut self) {
        if let Some((version, _)) = self
            .versions
            .iter()
            .max_by_key(|(_, v)| (v.created_at, v.seq))
        {
            self.latest_version = version.clone();
        }
    }

    /// Versions newest first
    fn ordered_versions(&self) -> Vec<(&String, &StoredVersion)> {
        let mut versions: Vec<_> = self.versions.iter().collect();
        versions.sort_by(|(_, a), (_, b)| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        versions
    }

    fn version_info(&self, name: &str, version: &str, stored: &StoredVersion) -> SecretVersionInfo {
        SecretVersionInfo {
            name: name.to_string(),
            version: version.to_string(),
            created_at: stored.created_at,
            labels: stored.labels.clone(),
            description: stored.description.clone(),
            is_latest: version == self.latest_version,
        }
    }

    fn summary(&self, name: &str) -> SecretSummary {
        SecretSummary {
            name: name.to_string(),
            latest_version: self.latest_version.clone(),
            version_count: self.versions.len(),
            labels: self.labels.clone(),
            description: self.description.clone(),
            rotation_hook: self.rotation_hook.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Secret store engine of the memory provider
pub struct MemorySecretStore {
    rt: Arc<Runtime>,
    records: RwLock<BTreeMap<String, SecretRecord>>,
}

impl MemorySecretStore {
    pub(crate) fn new(rt: Arc<Runtime>) -> Self {
        Self {
            rt,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    fn check_value_size(&self, len: usize) -> Result<()> {
        let max = self.rt.config.limits.max_secret_size_bytes;
        if len > max {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("secret value exceeds maximum size of {} bytes", max),
            )
            .with_context("size", len.to_string()));
        }
        Ok(())
    }

    fn check_metadata_size(
        &self,
        labels: &BTreeMap<String, String>,
        description: Option<&str>,
    ) -> Result<()> {
        let size = labels.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
            + description.map_or(0, str::len);
        let max = self.rt.config.limits.max_metadata_size_bytes;
        if size > max {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("labels and description exceed {} bytes", max),
            )
            .with_context("size", size.to_string()));
        }
        Ok(())
    }

    /// Insert a version under the write lock
    fn insert_version(
        &self,
        records: &mut BTreeMap<String, SecretRecord>,
        name: &str,
        value: SecretValue,
        options: PutSecretOptions,
    ) -> Result<SecretVersionInfo> {
        let now = self.rt.now();
        let record = records
            .entry(name.to_string())
            .or_insert_with(|| SecretRecord::new(now));

        let version = match options.version {
            Some(version) => {
                if record.versions.contains_key(&version) {
                    return Err(ProviderError::already_exists(COMPONENT, "secret version already exists")
                        .with_context("name", name)
                        .with_context("version", version));
                }
                version
            }
            None => record.generate_version(),
        };

        if !options.labels.is_empty() {
            record.labels = options.labels.clone();
        }
        if options.description.is_some() {
            record.description = options.description.clone();
        }
        if options.rotation_hook.is_some() {
            record.rotation_hook = options.rotation_hook;
        }

        let seq = record.next_seq;
        record.next_seq += 1;
        record.versions.insert(
            version.clone(),
            StoredVersion {
                value,
                created_at: now,
                labels: options.labels,
                description: options.description,
                seq,
            },
        );
        record.updated_at = now;
        record.recompute_latest();

        let stored = record
            .versions
            .get(&version)
            .ok_or_else(|| version_not_found(name, &version))?;
        Ok(record.version_info(name, &version, stored))
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        value: SecretValue,
        options: PutSecretOptions,
    ) -> Result<SecretVersionInfo> {
        self.rt
            .call(ctx, COMPONENT, "put_secret", async {
                validate_secret_name(name)?;
                if let Some(version) = &options.version {
                    validate_version_label(version)?;
                }
                self.check_value_size(value.len())?;
                self.check_metadata_size(&options.labels, options.description.as_deref())?;

                let result = {
                    let mut records = self.records.write().await;
                    self.insert_version(&mut records, name, value, options)
                };

                let mut event = self.rt.audit(ctx, "put_secret", "secret", name).with_outcome(&result);
                if let Ok(info) = &result {
                    event = event.with_metadata("version", info.version.as_str());
                }
                event.log();
                result
            })
            .await
    }

    async fn get_secret(&self, ctx: &ProviderContext, name: &str, version: Option<&str>) -> Result<Secret> {
        self.rt
            .call(ctx, COMPONENT, "get_secret", async {
                validate_secret_name(name)?;
                let records = self.records.read().await;
                let record = records.get(name).ok_or_else(|| not_found(name))?;
                let version = version.unwrap_or(&record.latest_version);
                let stored = record
                    .versions
                    .get(version)
                    .ok_or_else(|| version_not_found(name, version))?;

                Ok(Secret {
                    name: name.to_string(),
                    version: version.to_string(),
                    value: stored.value.clone(),
                    created_at: stored.created_at,
                    labels: stored.labels.clone(),
                    description: stored.description.clone(),
                })
            })
            .await
    }

    async fn delete_secret(&self, ctx: &ProviderContext, name: &str, version: Option<&str>) -> Result<()> {
        self.rt
            .call(ctx, COMPONENT, "delete_secret", async {
                validate_secret_name(name)?;
                let result = {
                    let mut records = self.records.write().await;
                    match version {
                        None => {
                            records.remove(name);
                            Ok(())
                        }
                        Some(version) => match records.get_mut(name) {
                            None => Err(not_found(name)),
                            Some(record) => {
                                if record.versions.remove(version).is_none() {
                                    Err(version_not_found(name, version))
                                } else {
                                    if record.versions.is_empty() {
                                        records.remove(name);
                                    } else {
                                        record.updated_at = self.rt.now();
                                        record.recompute_latest();
                                    }
                                    Ok(())
                                }
                            }
                        },
                    }
                };

                self.rt
                    .audit(ctx, "delete_secret", "secret", name)
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
        self.rt
            .call(ctx, COMPONENT, "list_secrets", async {
                let snapshot: Vec<SecretSummary> = {
                    let records = self.records.read().await;
                    records
                        .iter()
                        .filter(|(name, _)| {
                            request
                                .prefix
                                .as_deref()
                                .is_none_or(|prefix| name.starts_with(prefix))
                        })
                        .filter(|(_, record)| labels_match(&record.labels, &request.labels))
                        .map(|(name, record)| record.summary(name))
                        .collect()
                };
                paginate(snapshot, &request.page)
            })
            .await
    }

    async fn list_versions(
        &self,
        ctx: &ProviderContext,
        name: &str,
        page: PageRequest,
    ) -> Result<Page<SecretVersionInfo>> {
        self.rt
            .call(ctx, COMPONENT, "list_versions", async {
                validate_secret_name(name)?;
                let snapshot: Vec<SecretVersionInfo> = {
                    let records = self.records.read().await;
                    let record = records.get(name).ok_or_else(|| not_found(name))?;
                    record
                        .ordered_versions()
                        .into_iter()
                        .map(|(version, stored)| record.version_info(name, version, stored))
                        .collect()
                };
                paginate(snapshot, &page)
            })
            .await
    }

    async fn rotate_secret(&self, ctx: &ProviderContext, name: &str) -> Result<SecretVersionInfo> {
        self.rt
            .call(ctx, COMPONENT, "rotate_secret", async {
                validate_secret_name(name)?;
                let mut bytes = [0u8; ROTATED_VALUE_BYTES];
                rand::thread_rng().fill_bytes(&mut bytes);
                let value = SecretValue::from(hex::encode(bytes));

                let result = {
                    let mut records = self.records.write().await;
                    rotation_options(&records, name)
                        .and_then(|options| self.insert_version(&mut records, name, value, options))
                };

                self.rt
                    .audit(ctx, "rotate_secret", "secret", name)
                    .with_outcome(&result)
                    .log();
                result
            })
            .await
    }

    async fn update_secret_metadata(
        &self,
        ctx: &ProviderContext,
        name: &str,
        update: SecretMetadataUpdate,
    ) -> Result<SecretSummary> {
        self.rt
            .call(ctx, COMPONENT, "update_secret_metadata", async {
                validate_secret_name(name)?;
                let mut records = self.records.write().await;
                let record = records.get_mut(name).ok_or_else(|| not_found(name))?;

                let labels = update.labels.as_ref().unwrap_or(&record.labels);
                let description = update.description.as_deref().or(record.description.as_deref());
                self.check_metadata_size(labels, description)?;

                if let Some(labels) = update.labels {
                    record.labels = labels;
                }
                if let Some(description) = update.description {
                    record.description = Some(description);
                }
                if let Some(hook) = update.rotation_hook {
                    record.rotation_hook = Some(hook);
                }
                record.updated_at = self.rt.now();

                self.rt
                    .audit(ctx, "update_secret_metadata", "secret", name)
                    .log();
                Ok(record.summary(name))
            })
            .await
    }
}
