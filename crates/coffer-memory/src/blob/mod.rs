//! In-memory blob storage engine

mod eventual;
mod listing;
mod multipart;

use crate::runtime::Runtime;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use coffer_core::types::{
    ByteStream, CompletedPart, CopyObjectOptions, CreateMultipartOptions, GetObjectOptions,
    GetObjectOutput, ListObjectsOutput, ListObjectsRequest, MultipartUploadInfo, ObjectBody,
    ObjectMeta, PutObjectOptions, SignedUrl, SignedUrlMethod, StorageClass, UploadPartOutput,
};
use coffer_core::{BlobStorage, ProviderContext, ProviderError, Result};
use eventual::Staging;
use futures::stream::{self, StreamExt};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use url::form_urlencoded;
use zeroize::Zeroizing;

const COMPONENT: &str = "blob";

/// Longest lifetime a signed URL may have
pub const MAX_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const SIGNED_URL_BASE: &str = "memory://blob";

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn object_not_found(key: &str) -> ProviderError {
    ProviderError::not_found(COMPONENT, "object not found").with_context("key", key)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 1024 {
        return Err(ProviderError::invalid_config(
            COMPONENT,
            "object key must be between 1 and 1024 bytes",
        )
        .with_context("key_length", key.len().to_string()));
    }
    Ok(())
}

/// A committed object
#[derive(Clone)]
pub(crate) struct StoredObject {
    pub(crate) data: Bytes,
    pub(crate) meta: ObjectMeta,
}

/// Committed objects plus staged eventual changes
#[derive(Default)]
pub(crate) struct BlobState {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    staging: Mutex<Staging>,
}

impl BlobState {
    /// Commit the due staged change for one key
    async fn settle_key(&self, key: &str, now: DateTime<Utc>) {
        let mut staging = self.staging.lock().await;
        if staging.len() == 0 {
            return;
        }
        let mut objects = self.objects.write().await;
        staging.settle_key(key, now, &mut objects);
    }

    /// Commit every due staged change
    async fn settle_all(&self, now: DateTime<Utc>) -> usize {
        let mut staging = self.staging.lock().await;
        if staging.len() == 0 {
            return 0;
        }
        let mut objects = self.objects.write().await;
        staging.settle_all(now, &mut objects)
    }
}

/// Blob storage engine of the memory provider
pub struct MemoryBlobStorage {
    rt: Arc<Runtime>,
    state: Arc<BlobState>,
    uploads: multipart::UploadTable,
    signing_secret: Zeroizing<[u8; 32]>,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl MemoryBlobStorage {
    pub(crate) fn new(rt: Arc<Runtime>) -> Self {
        let mut signing_secret = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut *signing_secret);
        Self {
            rt,
            state: Arc::new(BlobState::default()),
            uploads: multipart::UploadTable::default(),
            signing_secret,
            sweeper: StdMutex::new(None),
        }
    }

    /// Start the background sweep when eventual consistency is enabled
    pub(crate) fn start_sweeper(&self) {
        let config = &self.rt.config.eventual_consistency;
        if !config.is_enabled() {
            return;
        }
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if sweeper.is_none() {
            *sweeper = Some(eventual::spawn_sweeper(
                Arc::downgrade(&self.state),
                self.rt.clone(),
                config.sweep_interval(),
            ));
        }
    }

    pub(crate) fn stop_sweeper(&self) {
        let handle = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Objects and staged changes, for health reporting
    pub(crate) async fn stats(&self) -> (usize, usize, usize) {
        let objects = self.state.objects.read().await.len();
        let staged = self.state.staging.lock().await.len();
        (objects, staged, self.uploads.len().await)
    }

    fn check_metadata_size(&self, metadata: &BTreeMap<String, String>) -> Result<()> {
        let size = metadata.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>();
        let max = self.rt.config.limits.max_metadata_size_bytes;
        if size > max {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("object metadata exceeds {} bytes", max),
            )
            .with_context("size", size.to_string()));
        }
        Ok(())
    }

    /// Make a write or delete visible, now or after the consistency window
    async fn commit(&self, key: &str, object: Option<StoredObject>) {
        let config = &self.rt.config.eventual_consistency;
        if config.is_enabled() {
            let apply_at = eventual::apply_at(self.rt.now(), config.window());
            self.state
                .staging
                .lock()
                .await
                .stage(key.to_string(), object, apply_at);
            tracing::debug!(key, %apply_at, "Staged object change");
            return;
        }

        let mut objects = self.state.objects.write().await;
        match object {
            Some(object) => {
                objects.insert(key.to_string(), object);
            }
            None => {
                objects.remove(key);
            }
        }
    }

    /// Build the stored form of a body
    fn build_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
        metadata: BTreeMap<String, String>,
        kms_key_id: Option<String>,
        storage_class: StorageClass,
    ) -> StoredObject {
        let sha256 = sha256_hex(&data);
        StoredObject {
            meta: ObjectMeta {
                key: key.to_string(),
                size: data.len() as u64,
                etag: sha256.clone(),
                sha256,
                content_type,
                metadata,
                kms_key_id,
                last_modified: self.rt.now(),
                storage_class,
            },
            data,
        }
    }

    async fn read_committed(&self, key: &str) -> Result<StoredObject> {
        self.state.settle_key(key, self.rt.now()).await;
        self.state
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| object_not_found(key))
    }

    fn signature(&self, key: &str, method: SignedUrlMethod, expires_at: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(b"|");
        hasher.update(method.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(expires_at.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.signing_secret.as_slice());
        hex::encode(hasher.finalize())
    }

    /// Check a signed URL produced by `create_signed_url` against the clock
    pub fn verify_signed_url(&self, url: &str) -> bool {
        let Some(rest) = url
            .strip_prefix(SIGNED_URL_BASE)
            .and_then(|r| r.strip_prefix('/'))
        else {
            return false;
        };
        let Some((path, query)) = rest.split_once('?') else {
            return false;
        };
        let key = decode_key(path);

        let mut method = None;
        let mut expires = None;
        let mut signature = None;
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*name {
                "method" => method = Some(value),
                "expires" => expires = value.parse::<i64>().ok(),
                "signature" => signature = Some(value),
                _ => {}
            }
        }
        let method = match method.as_deref() {
            Some("GET") => SignedUrlMethod::Get,
            Some("PUT") => SignedUrlMethod::Put,
            _ => return false,
        };
        let (Some(expires), Some(signature)) = (expires, signature) else {
            return false;
        };

        expires > self.rt.now().timestamp() && self.signature(&key, method, expires) == signature
    }
}

/// Percent-encode each `/`-separated segment of an object key
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| form_urlencoded::byte_serialize(segment.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_key(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            form_urlencoded::parse(segment.as_bytes())
                .next()
                .map(|(decoded, _)| decoded.into_owned())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `memory://blob/{key}?method=..&expires=..&signature=..` with every component encoded
fn signed_url_string(key: &str, method: SignedUrlMethod, expires: i64, signature: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("method", &method.to_string())
        .append_pair("expires", &expires.to_string())
        .append_pair("signature", signature)
        .finish();
    format!("{}/{}?{}", SIGNED_URL_BASE, encode_key(key), query)
}

impl Drop for MemoryBlobStorage {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

/// Lazily yield `data` in chunks of at most `chunk_size`
fn chunked(data: Bytes, chunk_size: usize) -> ByteStream {
    let chunk_size = chunk_size.max(1);
    stream::unfold(data, move |mut rest| async move {
        if rest.is_empty() {
            return None;
        }
        let chunk = rest.split_to(chunk_size.min(rest.len()));
        Some((Ok(chunk), rest))
    })
    .boxed()
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put_object(
        &self,
        ctx: &ProviderContext,
        key: &str,
        body: ObjectBody,
        options: PutObjectOptions,
    ) -> Result<ObjectMeta> {
        self.rt
            .call(ctx, COMPONENT, "put_object", async {
                validate_key(key)?;
                self.check_metadata_size(&options.metadata)?;
                let data = body
                    .collect(self.rt.config.limits.max_object_size_bytes, COMPONENT)
                    .await?;

                let object = self.build_object(
                    key,
                    data,
                    options.content_type,
                    options.metadata,
                    options.kms_key_id,
                    options.storage_class.unwrap_or_default(),
                );
                if let Some(expected) = &options.sha256 {
                    if !expected.eq_ignore_ascii_case(&object.meta.sha256) {
                        let err = ProviderError::data_integrity(
                            COMPONENT,
                            "object body does not match the expected SHA-256",
                        )
                        .with_context("key", key)
                        .with_context("expected", expected.as_str())
                        .with_context("actual", object.meta.sha256.as_str());
                        self.rt
                            .audit(ctx, "put_object", "object", key)
                            .with_error(&err)
                            .log();
                        return Err(err);
                    }
                }

                let meta = object.meta.clone();
                self.commit(key, Some(object)).await;
                self.rt
                    .audit(ctx, "put_object", "object", key)
                    .with_metadata("size", meta.size.to_string())
                    .log();
                Ok(meta)
            })
            .await
    }

    async fn get_object(
        &self,
        ctx: &ProviderContext,
        key: &str,
        options: GetObjectOptions,
    ) -> Result<GetObjectOutput> {
        self.rt
            .call(ctx, COMPONENT, "get_object", async {
                validate_key(key)?;
                let object = self.read_committed(key).await?;

                if let Some(etag) = &options.if_none_match {
                    if etag.trim_matches('"') == object.meta.etag {
                        return Err(ProviderError::not_modified(COMPONENT, key));
                    }
                }
                if let Some(since) = options.if_modified_since {
                    if object.meta.last_modified <= since {
                        return Err(ProviderError::not_modified(COMPONENT, key));
                    }
                }

                let data = match options.range {
                    Some(range) => {
                        let slice = range.resolve(object.data.len(), COMPONENT)?;
                        object.data.slice(slice)
                    }
                    None => object.data,
                };

                Ok(GetObjectOutput {
                    meta: object.meta,
                    range: options.range,
                    body: chunked(data, self.rt.config.limits.read_chunk_size_bytes),
                })
            })
            .await
    }

    async fn head_object(&self, ctx: &ProviderContext, key: &str) -> Result<ObjectMeta> {
        self.rt
            .call(ctx, COMPONENT, "head_object", async {
                validate_key(key)?;
                Ok(self.read_committed(key).await?.meta)
            })
            .await
    }

    async fn object_exists(&self, ctx: &ProviderContext, key: &str) -> Result<bool> {
        self.rt
            .call(ctx, COMPONENT, "object_exists", async {
                validate_key(key)?;
                self.state.settle_key(key, self.rt.now()).await;
                Ok(self.state.objects.read().await.contains_key(key))
            })
            .await
    }

    async fn delete_object(&self, ctx: &ProviderContext, key: &str) -> Result<()> {
        self.rt
            .call(ctx, COMPONENT, "delete_object", async {
                validate_key(key)?;
                self.commit(key, None).await;
                self.rt.audit(ctx, "delete_object", "object", key).log();
                Ok(())
            })
            .await
    }

    async fn list_objects(
        &self,
        ctx: &ProviderContext,
        request: ListObjectsRequest,
    ) -> Result<ListObjectsOutput> {
        self.rt
            .call(ctx, COMPONENT, "list_objects", async {
                self.state.settle_all(self.rt.now()).await;
                let objects = self.state.objects.read().await;
                listing::list(&objects, &request)
            })
            .await
    }

    async fn copy_object(
        &self,
        ctx: &ProviderContext,
        source: &str,
        destination: &str,
        options: CopyObjectOptions,
    ) -> Result<ObjectMeta> {
        self.rt
            .call(ctx, COMPONENT, "copy_object", async {
                validate_key(source)?;
                validate_key(destination)?;
                if let Some(metadata) = &options.metadata {
                    self.check_metadata_size(metadata)?;
                }
                let source_object = self.read_committed(source).await?;
                let meta = source_object.meta;

                let object = self.build_object(
                    destination,
                    source_object.data,
                    meta.content_type,
                    options.metadata.unwrap_or(meta.metadata),
                    options.kms_key_id.or(meta.kms_key_id),
                    meta.storage_class,
                );
                let copied = object.meta.clone();
                self.commit(destination, Some(object)).await;
                self.rt
                    .audit(ctx, "copy_object", "object", destination)
                    .with_metadata("source", source)
                    .log();
                Ok(copied)
            })
            .await
    }

    async fn create_multipart_upload(
        &self,
        ctx: &ProviderContext,
        key: &str,
        options: CreateMultipartOptions,
    ) -> Result<MultipartUploadInfo> {
        self.rt
            .call(ctx, COMPONENT, "create_multipart_upload", async {
                validate_key(key)?;
                self.check_metadata_size(&options.metadata)?;
                let info = self.uploads.open(key, options, self.rt.now()).await;
                tracing::debug!(key, upload_id = %info.upload_id, "Opened multipart upload");
                Ok(info)
            })
            .await
    }

    async fn upload_part(
        &self,
        ctx: &ProviderContext,
        upload_id: &str,
        part_number: u32,
        body: ObjectBody,
    ) -> Result<UploadPartOutput> {
        self.rt
            .call(ctx, COMPONENT, "upload_part", async {
                multipart::validate_part_number(part_number)?;
                let upload = self.uploads.get(upload_id).await?;
                let data = body
                    .collect(self.rt.config.limits.max_object_size_bytes, COMPONENT)
                    .await?;
                let etag = upload.lock().await.put_part(part_number, data)?;
                Ok(UploadPartOutput { part_number, etag })
            })
            .await
    }

    async fn complete_multipart_upload(
        &self,
        ctx: &ProviderContext,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<ObjectMeta> {
        self.rt
            .call(ctx, COMPONENT, "complete_multipart_upload", async {
                let upload = self.uploads.get(upload_id).await?;
                let mut upload = upload.lock().await;
                let data = upload.assemble(&parts, self.rt.config.limits.max_object_size_bytes)?;

                let key = upload.key.clone();
                let object = self.build_object(
                    &key,
                    data,
                    upload.options.content_type.clone(),
                    upload.options.metadata.clone(),
                    upload.options.kms_key_id.clone(),
                    StorageClass::Standard,
                );
                let meta = object.meta.clone();
                self.commit(&key, Some(object)).await;
                upload.close();
                drop(upload);
                self.uploads.remove(upload_id).await;

                self.rt
                    .audit(ctx, "complete_multipart_upload", "object", &key)
                    .with_metadata("upload_id", upload_id)
                    .with_metadata("parts", parts.len().to_string())
                    .log();
                Ok(meta)
            })
            .await
    }

    async fn abort_multipart_upload(&self, ctx: &ProviderContext, upload_id: &str) -> Result<()> {
        self.rt
            .call(ctx, COMPONENT, "abort_multipart_upload", async {
                if let Some(upload) = self.uploads.remove(upload_id).await {
                    upload.lock().await.close();
                    tracing::debug!(upload_id, "Aborted multipart upload");
                }
                Ok(())
            })
            .await
    }

    async fn create_signed_url(
        &self,
        ctx: &ProviderContext,
        key: &str,
        method: SignedUrlMethod,
        expires_in: Duration,
    ) -> Result<SignedUrl> {
        self.rt
            .call(ctx, COMPONENT, "create_signed_url", async {
                validate_key(key)?;
                if expires_in.is_zero() || expires_in > MAX_SIGNED_URL_EXPIRY {
                    return Err(ProviderError::invalid_config(
                        COMPONENT,
                        "signed URL expiry must be greater than zero and at most 7 days",
                    )
                    .with_context("expires_in_secs", expires_in.as_secs().to_string()));
                }

                let lifetime = TimeDelta::from_std(expires_in).map_err(|e| {
                    ProviderError::invalid_config(COMPONENT, format!("invalid expiry: {}", e))
                })?;
                let expires_at = self.rt.now() + lifetime;
                let expires = expires_at.timestamp();
                let signature = self.signature(key, method, expires);

                Ok(SignedUrl {
                    url: signed_url_string(key, method, expires, &signature),
                    expires_at,
                    method,
                })
            })
            .await
    }
}
