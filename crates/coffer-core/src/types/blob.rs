//! Blob/object storage types

use crate::error::{ProviderError, Result};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A finite stream of body chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Upper bound on multipart part numbers
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Request body for object writes
pub enum ObjectBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

impl ObjectBody {
    /// Wrap a chunk stream
    pub fn from_stream(stream: ByteStream) -> Self {
        ObjectBody::Stream(stream)
    }

    /// Buffer the whole body, failing once it grows past `max_size`
    pub async fn collect(self, max_size: usize, component: &str) -> Result<Bytes> {
        let too_large = |size: usize| {
            ProviderError::invalid_config(
                component.to_string(),
                format!("object body exceeds maximum size of {} bytes", max_size),
            )
            .with_context("size", size.to_string())
        };

        match self {
            ObjectBody::Bytes(bytes) => {
                if bytes.len() > max_size {
                    return Err(too_large(bytes.len()));
                }
                Ok(bytes)
            }
            ObjectBody::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if buffer.len() + chunk.len() > max_size {
                        return Err(too_large(buffer.len() + chunk.len()));
                    }
                    buffer.extend_from_slice(&chunk);
                }
                Ok(buffer.freeze())
            }
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectBody::Bytes(bytes) => write!(f, "ObjectBody::Bytes({} bytes)", bytes.len()),
            ObjectBody::Stream(_) => write!(f, "ObjectBody::Stream"),
        }
    }
}

impl From<Bytes> for ObjectBody {
    fn from(value: Bytes) -> Self {
        ObjectBody::Bytes(value)
    }
}

impl From<Vec<u8>> for ObjectBody {
    fn from(value: Vec<u8>) -> Self {
        ObjectBody::Bytes(Bytes::from(value))
    }
}

impl From<&'static [u8]> for ObjectBody {
    fn from(value: &'static [u8]) -> Self {
        ObjectBody::Bytes(Bytes::from_static(value))
    }
}

impl From<&'static str> for ObjectBody {
    fn from(value: &'static str) -> Self {
        ObjectBody::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

/// Storage tier of an object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    #[default]
    Standard,
    InfrequentAccess,
    Archive,
}

/// Options for `put_object`
#[derive(Debug, Clone, Default)]
pub struct PutObjectOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Expected hex SHA-256 of the body, checked before commit
    pub sha256: Option<String>,
    pub kms_key_id: Option<String>,
    pub storage_class: Option<StorageClass>,
}

impl PutObjectOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    pub fn with_kms_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(key_id.into());
        self
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = Some(storage_class);
        self
    }
}

/// Inclusive byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Resolve against an object length into a half-open slice range
    pub fn resolve(&self, len: usize, component: &str) -> Result<std::ops::Range<usize>> {
        let invalid = |message: &str| {
            ProviderError::invalid_config(component.to_string(), message.to_string())
                .with_context("range", format!("{}-{}", self.start, self.end))
                .with_context("length", len.to_string())
        };
        if self.end < self.start {
            return Err(invalid("range end precedes range start"));
        }
        if self.end >= len as u64 {
            return Err(invalid("range is outside the object"));
        }
        Ok(self.start as usize..self.end as usize + 1)
    }
}

/// Options for `get_object`
#[derive(Debug, Clone, Default)]
pub struct GetObjectOptions {
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_none_match: Option<String>,
    pub range: Option<ByteRange>,
}

impl GetObjectOptions {
    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.range = Some(ByteRange::new(start, end));
        self
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    pub fn if_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(since);
        self
    }
}

/// Object metadata as returned by head/get/list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub sha256: String,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub kms_key_id: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub storage_class: StorageClass,
}

/// Result of `get_object`
pub struct GetObjectOutput {
    pub meta: ObjectMeta,
    /// Byte range served, when a range was requested
    pub range: Option<ByteRange>,
    pub body: ByteStream,
}

impl GetObjectOutput {
    /// Drain the body stream into one buffer
    pub async fn into_bytes(self) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        let mut body = self.body;
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("meta", &self.meta)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Listing request
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    /// Defaults to 1000 when absent
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl ListObjectsRequest {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }
}

/// Listing result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsOutput {
    pub objects: Vec<ObjectMeta>,
    pub common_prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}

/// Options for `copy_object`; absent fields are carried from the source
#[derive(Debug, Clone, Default)]
pub struct CopyObjectOptions {
    pub metadata: Option<BTreeMap<String, String>>,
    pub kms_key_id: Option<String>,
}

/// Options for `create_multipart_upload`
#[derive(Debug, Clone, Default)]
pub struct CreateMultipartOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub kms_key_id: Option<String>,
}

/// Handle returned when a multipart upload is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUploadInfo {
    pub upload_id: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// Result of `upload_part`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPartOutput {
    pub part_number: u32,
    pub etag: String,
}

/// One manifest entry for `complete_multipart_upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

impl From<UploadPartOutput> for CompletedPart {
    fn from(value: UploadPartOutput) -> Self {
        Self {
            part_number: value.part_number,
            etag: value.etag,
        }
    }
}

/// HTTP method a signed URL grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignedUrlMethod {
    Get,
    Put,
}

impl fmt::Display for SignedUrlMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignedUrlMethod::Get => write!(f, "GET"),
            SignedUrlMethod::Put => write!(f, "PUT"),
        }
    }
}

/// Time-limited URL for direct object access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub method: SignedUrlMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::stream;

    #[tokio::test]
    async fn test_collect_stream_body() {
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let body = ObjectBody::from_stream(stream::iter(chunks).boxed());
        let bytes = body.collect(1024, "test").await.unwrap();
        assert_eq!(&bytes[..], b"hello world");
    }

    #[tokio::test]
    async fn test_collect_enforces_ceiling_while_streaming() {
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"0123")), Ok(Bytes::from_static(b"4567"))];
        let body = ObjectBody::from_stream(stream::iter(chunks).boxed());
        let err = body.collect(6, "test").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_range_resolution() {
        assert_eq!(ByteRange::new(2, 4).resolve(10, "test").unwrap(), 2..5);
        assert_eq!(ByteRange::new(0, 0).resolve(1, "test").unwrap(), 0..1);

        let err = ByteRange::new(5, 2).resolve(10, "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        let err = ByteRange::new(0, 10).resolve(10, "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
