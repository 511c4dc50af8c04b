//! In-memory key management engine
//!
//! Keys live in a single table guarded by one lock. Every rotation adds a new
//! version and keeps the old ones, so envelopes produced before a rotation
//! still decrypt and old signatures still verify.

mod cipher;
mod keys;

use crate::runtime::Runtime;
use async_trait::async_trait;
use cipher::{KeyMaterial, AEAD_KEY_LEN};
use coffer_core::envelope::Envelope;
use coffer_core::types::{
    paginate, CreateKeyRequest, DataKey, DecryptOutput, EncryptOutput, KeyAlgorithm, KeyMetadata,
    KeyState, KeyUsage, Page, PageRequest, SecretValue, SignOutput,
};
use coffer_core::{KmsEngine, ProviderContext, ProviderError, Result};
use keys::{validate_alias, KeyRecord, KeyTable, KeyVersion};
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

const COMPONENT: &str = "kms";

/// Allowed pending-deletion window in days
pub const MIN_DELETION_WINDOW_DAYS: u32 = 7;
pub const MAX_DELETION_WINDOW_DAYS: u32 = 30;

/// Key management engine of the memory provider
pub struct MemoryKms {
    rt: Arc<Runtime>,
    table: RwLock<KeyTable>,
}

impl MemoryKms {
    pub(crate) fn new(rt: Arc<Runtime>) -> Self {
        Self {
            rt,
            table: RwLock::new(KeyTable::default()),
        }
    }

    fn check_plaintext_size(&self, len: usize) -> Result<()> {
        let max = self.rt.config.limits.max_plaintext_size_bytes;
        if len > max {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("plaintext exceeds maximum size of {} bytes", max),
            )
            .with_context("size", len.to_string()));
        }
        Ok(())
    }

    fn check_metadata_size(&self, description: Option<&str>, tags: &BTreeMap<String, String>) -> Result<()> {
        let size = description.map_or(0, str::len)
            + tags.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>();
        let max = self.rt.config.limits.max_metadata_size_bytes;
        if size > max {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("key description and tags exceed {} bytes", max),
            )
            .with_context("size", size.to_string()));
        }
        Ok(())
    }

    fn encrypt_with(
        table: &KeyTable,
        key_id: &str,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<EncryptOutput> {
        let record = table.get(key_id)?;
        record.ensure_usable(KeyUsage::EncryptDecrypt)?;
        let version = record.current()?;

        let sealed = cipher::seal(record.algorithm, &version.material, plaintext, aad.unwrap_or_default())?;
        let envelope = Envelope::new(
            &record.key_id,
            record.current_version,
            sealed.iv,
            sealed.tag,
            aad.filter(|a| !a.is_empty()).map(<[u8]>::to_vec),
            sealed.ciphertext,
        );

        Ok(EncryptOutput {
            ciphertext: envelope.to_bytes()?,
            key_id: record.key_id.clone(),
            key_version: record.current_version,
            algorithm: record.algorithm,
        })
    }

    fn mutable_record<'a>(table: &'a mut KeyTable, key_id: &str) -> Result<&'a mut KeyRecord> {
        let record = table.get_mut(key_id)?;
        if record.state == KeyState::PendingDeletion {
            return Err(ProviderError::permission_denied(
                COMPONENT,
                "key is pending deletion",
            )
            .with_context("key_id", record.key_id.as_str()));
        }
        Ok(record)
    }
}

#[async_trait]
impl KmsEngine for MemoryKms {
    async fn create_key(&self, ctx: &ProviderContext, request: CreateKeyRequest) -> Result<KeyMetadata> {
        self.rt
            .call(ctx, COMPONENT, "create_key", async {
                let algorithm = request
                    .algorithm
                    .unwrap_or_else(|| KeyAlgorithm::default_for(request.usage));
                if algorithm.usage() != request.usage {
                    return Err(ProviderError::invalid_config(
                        COMPONENT,
                        format!("algorithm {} cannot serve usage {}", algorithm, request.usage),
                    ));
                }
                if let Some(alias) = &request.alias {
                    validate_alias(alias)?;
                }
                self.check_metadata_size(request.description.as_deref(), &request.tags)?;

                let mut table = self.table.write().await;
                if let Some(alias) = &request.alias {
                    if table.aliases.contains_key(alias) {
                        return Err(ProviderError::already_exists(COMPONENT, "alias is already in use")
                            .with_context("alias", alias.as_str()));
                    }
                }

                let now = self.rt.now();
                let key_id = uuid::Uuid::new_v4().to_string();
                let mut versions = BTreeMap::new();
                versions.insert(
                    1,
                    KeyVersion {
                        material: KeyMaterial::generate(algorithm),
                    },
                );
                let record = KeyRecord {
                    key_id: key_id.clone(),
                    alias: request.alias.clone(),
                    algorithm,
                    usage: request.usage,
                    state: KeyState::Enabled,
                    description: request.description.clone(),
                    tags: request.tags.clone(),
                    created_at: now,
                    rotated_at: None,
                    deletion_date: None,
                    current_version: 1,
                    versions,
                };
                let metadata = record.metadata();

                if let Some(alias) = &request.alias {
                    table.aliases.insert(alias.clone(), key_id.clone());
                }
                table.keys.insert(key_id.clone(), record);

                self.rt
                    .audit(ctx, "create_key", "key", &key_id)
                    .with_metadata("algorithm", algorithm.to_string())
                    .log();
                Ok(metadata)
            })
            .await
    }

    async fn encrypt(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<EncryptOutput> {
        self.rt
            .call(ctx, COMPONENT, "encrypt", async {
                self.check_plaintext_size(plaintext.len())?;
                let table = self.table.read().await;
                Self::encrypt_with(&table, key_id, plaintext, aad)
            })
            .await
    }

    async fn decrypt(
        &self,
        ctx: &ProviderContext,
        ciphertext: &[u8],
        key_id: Option<&str>,
    ) -> Result<DecryptOutput> {
        self.rt
            .call(ctx, COMPONENT, "decrypt", async {
                let envelope = Envelope::from_bytes(ciphertext)?;
                let (envelope_key_id, version) = envelope.key_id_and_version()?;

                let table = self.table.read().await;
                let record = table.get(key_id.unwrap_or(envelope_key_id))?;
                if record.key_id != envelope_key_id {
                    return Err(ProviderError::data_integrity(
                        COMPONENT,
                        "envelope was not produced by the requested key",
                    )
                    .with_context("key_id", record.key_id.as_str()));
                }
                record.ensure_usable(KeyUsage::EncryptDecrypt)?;

                let algorithm = envelope.algorithm()?;
                if algorithm != record.algorithm {
                    return Err(ProviderError::data_integrity(
                        COMPONENT,
                        "envelope algorithm does not match the key",
                    )
                    .with_context("envelope_algorithm", algorithm.to_string())
                    .with_context("key_algorithm", record.algorithm.to_string()));
                }

                let key_version = record.version(version)?;
                let mut plaintext = cipher::open(
                    algorithm,
                    &key_version.material,
                    &envelope.iv,
                    &envelope.ciphertext,
                    &envelope.tag,
                    envelope.aad.as_deref().unwrap_or_default(),
                )?;

                Ok(DecryptOutput {
                    plaintext: SecretValue::new(std::mem::take(&mut *plaintext)),
                    key_id: record.key_id.clone(),
                    key_version: version,
                })
            })
            .await
    }

    async fn sign(&self, ctx: &ProviderContext, key_id: &str, message: &[u8]) -> Result<SignOutput> {
        self.rt
            .call(ctx, COMPONENT, "sign", async {
                let table = self.table.read().await;
                let record = table.get(key_id)?;
                record.ensure_usable(KeyUsage::SignVerify)?;
                let signature = record.current()?.material.sign(message)?;
                Ok(SignOutput {
                    signature,
                    key_id: record.key_id.clone(),
                    key_version: record.current_version,
                    algorithm: record.algorithm,
                })
            })
            .await
    }

    async fn verify(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        self.rt
            .call(ctx, COMPONENT, "verify", async {
                let table = self.table.read().await;
                let record = table.get(key_id)?;
                record.ensure_usable(KeyUsage::SignVerify)?;
                Ok(record
                    .versions
                    .values()
                    .rev()
                    .any(|v| v.material.verify(message, signature)))
            })
            .await
    }

    async fn rotate_key(&self, ctx: &ProviderContext, key_id: &str) -> Result<KeyMetadata> {
        self.rt
            .call(ctx, COMPONENT, "rotate_key", async {
                let now = self.rt.now();
                let mut table = self.table.write().await;
                let record = Self::mutable_record(&mut table, key_id)?;

                let next = record.current_version + 1;
                record.versions.insert(
                    next,
                    KeyVersion {
                        material: KeyMaterial::generate(record.algorithm),
                    },
                );
                record.current_version = next;
                record.rotated_at = Some(now);

                self.rt
                    .audit(ctx, "rotate_key", "key", &record.key_id)
                    .with_metadata("version", next.to_string())
                    .log();
                Ok(record.metadata())
            })
            .await
    }

    async fn get_key(&self, ctx: &ProviderContext, key_id: &str) -> Result<KeyMetadata> {
        self.rt
            .call(ctx, COMPONENT, "get_key", async {
                let table = self.table.read().await;
                Ok(table.get(key_id)?.metadata())
            })
            .await
    }

    async fn list_keys(&self, ctx: &ProviderContext, page: PageRequest) -> Result<Page<KeyMetadata>> {
        self.rt
            .call(ctx, COMPONENT, "list_keys", async {
                let snapshot: Vec<KeyMetadata> = {
                    let table = self.table.read().await;
                    table.keys.values().map(KeyRecord::metadata).collect()
                };
                paginate(snapshot, &page)
            })
            .await
    }

    async fn set_key_enabled(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        enabled: bool,
    ) -> Result<KeyMetadata> {
        self.rt
            .call(ctx, COMPONENT, "set_key_enabled", async {
                let mut table = self.table.write().await;
                let record = Self::mutable_record(&mut table, key_id)?;
                record.state = if enabled {
                    KeyState::Enabled
                } else {
                    KeyState::Disabled
                };

                self.rt
                    .audit(ctx, if enabled { "enable_key" } else { "disable_key" }, "key", &record.key_id)
                    .log();
                Ok(record.metadata())
            })
            .await
    }

    async fn schedule_key_deletion(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        pending_window_days: u32,
    ) -> Result<KeyMetadata> {
        self.rt
            .call(ctx, COMPONENT, "schedule_key_deletion", async {
                if !(MIN_DELETION_WINDOW_DAYS..=MAX_DELETION_WINDOW_DAYS).contains(&pending_window_days) {
                    return Err(ProviderError::invalid_config(
                        COMPONENT,
                        format!(
                            "pending window must be between {} and {} days",
                            MIN_DELETION_WINDOW_DAYS, MAX_DELETION_WINDOW_DAYS
                        ),
                    )
                    .with_context("pending_window_days", pending_window_days.to_string()));
                }

                let now = self.rt.now();
                let mut table = self.table.write().await;
                let record = Self::mutable_record(&mut table, key_id)?;
                let deletion_date = now + chrono::Duration::days(i64::from(pending_window_days));
                record.state = KeyState::PendingDeletion;
                record.deletion_date = Some(deletion_date);

                self.rt
                    .audit(ctx, "schedule_key_deletion", "key", &record.key_id)
                    .with_metadata("deletion_date", deletion_date.to_rfc3339())
                    .log();
                Ok(record.metadata())
            })
            .await
    }

    async fn generate_data_key(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        aad: Option<&[u8]>,
    ) -> Result<DataKey> {
        self.rt
            .call(ctx, COMPONENT, "generate_data_key", async {
                let mut data_key = Zeroizing::new(vec![0u8; AEAD_KEY_LEN]);
                rand::thread_rng().fill_bytes(data_key.as_mut_slice());

                let table = self.table.read().await;
                let output = Self::encrypt_with(&table, key_id, &data_key, aad)?;
                Ok(DataKey {
                    plaintext: SecretValue::new(std::mem::take(&mut *data_key)),
                    ciphertext: output.ciphertext,
                    key_id: output.key_id,
                    key_version: output.key_version,
                })
            })
            .await
    }
}
