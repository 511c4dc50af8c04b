//! Provider and engine trait definitions

use crate::context::ProviderContext;
use crate::error::Result;
use crate::provider::capabilities::Capabilities;
use crate::types::{
    CompletedPart, CopyObjectOptions, CreateKeyRequest, CreateMultipartOptions, DataKey,
    DecryptOutput, EncryptOutput, GetObjectOptions, GetObjectOutput, KeyMetadata,
    ListObjectsOutput, ListObjectsRequest, ListSecretsRequest, MultipartUploadInfo, ObjectBody,
    ObjectMeta, Page, PageRequest, PutObjectOptions, PutSecretOptions, Secret,
    SecretMetadataUpdate, SecretSummary, SecretValue, SecretVersionInfo, SignOutput, SignedUrl,
    SignedUrlMethod, UploadPartOutput,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Static description of a provider implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl ProviderInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Coarse health state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of a health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl HealthStatus {
    pub fn healthy(checked_at: DateTime<Utc>) -> Self {
        Self {
            state: HealthState::Healthy,
            message: None,
            checked_at,
            details: BTreeMap::new(),
        }
    }

    pub fn unhealthy(checked_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unhealthy,
            message: Some(message.into()),
            checked_at,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// A backend exposing up to three capability families
///
/// Engine accessors return `None` when the family is not offered; callers
/// must check before use. Engine calls made before [`Provider::init`] or
/// after [`Provider::shutdown`] fail with `Internal`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identity
    fn info(&self) -> &ProviderInfo;

    /// Advertised capabilities
    fn capabilities(&self) -> Capabilities;

    /// Prepare the provider for use
    async fn init(&self, ctx: &ProviderContext) -> Result<()>;

    /// Probe backend health
    async fn health(&self, ctx: &ProviderContext) -> Result<HealthStatus>;

    /// Release resources; engines refuse calls afterwards
    async fn shutdown(&self, ctx: &ProviderContext) -> Result<()>;

    /// Key management engine
    fn kms(&self) -> Option<&dyn KmsEngine> {
        None
    }

    /// Secret storage engine
    fn secret_store(&self) -> Option<&dyn SecretStore> {
        None
    }

    /// Object storage engine
    fn blob_storage(&self) -> Option<&dyn BlobStorage> {
        None
    }
}

/// Key management operations
#[async_trait]
pub trait KmsEngine: Send + Sync {
    /// Create a key; the algorithm defaults from the usage
    async fn create_key(&self, ctx: &ProviderContext, request: CreateKeyRequest)
        -> Result<KeyMetadata>;

    /// Encrypt under the current version of a key (id or alias)
    async fn encrypt(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<EncryptOutput>;

    /// Decrypt an envelope; `key_id` overrides the key named in the envelope
    async fn decrypt(
        &self,
        ctx: &ProviderContext,
        ciphertext: &[u8],
        key_id: Option<&str>,
    ) -> Result<DecryptOutput>;

    async fn sign(&self, ctx: &ProviderContext, key_id: &str, message: &[u8])
        -> Result<SignOutput>;

    /// `Ok(false)` for a signature no retained key version accepts
    async fn verify(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool>;

    /// New material and version under the same key id
    async fn rotate_key(&self, ctx: &ProviderContext, key_id: &str) -> Result<KeyMetadata>;

    async fn get_key(&self, ctx: &ProviderContext, key_id: &str) -> Result<KeyMetadata>;

    async fn list_keys(&self, ctx: &ProviderContext, page: PageRequest)
        -> Result<Page<KeyMetadata>>;

    async fn set_key_enabled(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        enabled: bool,
    ) -> Result<KeyMetadata>;

    /// Move a key into the terminal pending-deletion state
    async fn schedule_key_deletion(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        pending_window_days: u32,
    ) -> Result<KeyMetadata>;

    /// Fresh 256-bit data key plus its envelope under `key_id`
    async fn generate_data_key(
        &self,
        ctx: &ProviderContext,
        key_id: &str,
        aad: Option<&[u8]>,
    ) -> Result<DataKey>;
}

/// Versioned secret storage operations
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        value: SecretValue,
        options: PutSecretOptions,
    ) -> Result<SecretVersionInfo>;

    /// Latest version unless `version` is given
    async fn get_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        version: Option<&str>,
    ) -> Result<Secret>;

    /// Delete one version, or the whole record when `version` is `None`
    async fn delete_secret(
        &self,
        ctx: &ProviderContext,
        name: &str,
        version: Option<&str>,
    ) -> Result<()>;

    async fn list_secrets(
        &self,
        ctx: &ProviderContext,
        request: ListSecretsRequest,
    ) -> Result<Page<SecretSummary>>;

    /// Versions newest first
    async fn list_versions(
        &self,
        ctx: &ProviderContext,
        name: &str,
        page: PageRequest,
    ) -> Result<Page<SecretVersionInfo>>;

    async fn rotate_secret(&self, ctx: &ProviderContext, name: &str)
        -> Result<SecretVersionInfo>;

    async fn update_secret_metadata(
        &self,
        ctx: &ProviderContext,
        name: &str,
        update: SecretMetadataUpdate,
    ) -> Result<SecretSummary>;
}

/// Object storage operations
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put_object(
        &self,
        ctx: &ProviderContext,
        key: &str,
        body: ObjectBody,
        options: PutObjectOptions,
    ) -> Result<ObjectMeta>;

    async fn get_object(
        &self,
        ctx: &ProviderContext,
        key: &str,
        options: GetObjectOptions,
    ) -> Result<GetObjectOutput>;

    async fn head_object(&self, ctx: &ProviderContext, key: &str) -> Result<ObjectMeta>;

    async fn object_exists(&self, ctx: &ProviderContext, key: &str) -> Result<bool>;

    /// Deleting a missing object succeeds
    async fn delete_object(&self, ctx: &ProviderContext, key: &str) -> Result<()>;

    async fn list_objects(
        &self,
        ctx: &ProviderContext,
        request: ListObjectsRequest,
    ) -> Result<ListObjectsOutput>;

    async fn copy_object(
        &self,
        ctx: &ProviderContext,
        source_key: &str,
        destination_key: &str,
        options: CopyObjectOptions,
    ) -> Result<ObjectMeta>;

    async fn create_multipart_upload(
        &self,
        ctx: &ProviderContext,
        key: &str,
        options: CreateMultipartOptions,
    ) -> Result<MultipartUploadInfo>;

    async fn upload_part(
        &self,
        ctx: &ProviderContext,
        upload_id: &str,
        part_number: u32,
        body: ObjectBody,
    ) -> Result<UploadPartOutput>;

    async fn complete_multipart_upload(
        &self,
        ctx: &ProviderContext,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<ObjectMeta>;

    /// Discard an upload; aborting an unknown upload succeeds
    async fn abort_multipart_upload(&self, ctx: &ProviderContext, upload_id: &str)
        -> Result<()>;

    async fn create_signed_url(
        &self,
        ctx: &ProviderContext,
        key: &str,
        method: SignedUrlMethod,
        expires_in: Duration,
    ) -> Result<SignedUrl>;
}
