//! Multipart upload bookkeeping

use super::sha256_hex;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use coffer_core::types::{CompletedPart, CreateMultipartOptions, MultipartUploadInfo, MAX_PART_NUMBER};
use coffer_core::{ProviderError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

const COMPONENT: &str = "blob";

pub(crate) fn upload_not_found(upload_id: &str) -> ProviderError {
    ProviderError::not_found(COMPONENT, "multipart upload not found").with_context("upload_id", upload_id)
}

/// Reject part numbers outside `1..=10000`
pub(crate) fn validate_part_number(part_number: u32) -> Result<()> {
    if !(1..=MAX_PART_NUMBER).contains(&part_number) {
        return Err(ProviderError::invalid_config(
            COMPONENT,
            format!("part number must be between 1 and {}", MAX_PART_NUMBER),
        )
        .with_context("part_number", part_number.to_string()));
    }
    Ok(())
}

struct Part {
    data: Bytes,
    etag: String,
}

/// State of one open upload; the mutex around it serializes parts,
/// completion and abort
pub(crate) struct MultipartUpload {
    pub(crate) upload_id: String,
    pub(crate) key: String,
    pub(crate) options: CreateMultipartOptions,
    pub(crate) created_at: DateTime<Utc>,
    parts: BTreeMap<u32, Part>,
    /// Set once completed or aborted
    closed: bool,
}

impl MultipartUpload {
    pub(crate) fn info(&self) -> MultipartUploadInfo {
        MultipartUploadInfo {
            upload_id: self.upload_id.clone(),
            key: self.key.clone(),
            created_at: self.created_at,
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(upload_not_found(&self.upload_id));
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.parts.clear();
    }

    /// Store a part, replacing any earlier upload of the same number
    pub(crate) fn put_part(&mut self, part_number: u32, data: Bytes) -> Result<String> {
        self.ensure_open()?;
        validate_part_number(part_number)?;
        let etag = sha256_hex(&data);
        self.parts.insert(
            part_number,
            Part {
                data,
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }

    /// Validate the manifest and concatenate its parts in order
    pub(crate) fn assemble(&self, manifest: &[CompletedPart], max_size: usize) -> Result<Bytes> {
        self.ensure_open()?;
        if manifest.is_empty() {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "multipart manifest must list at least one part",
            )
            .with_context("upload_id", self.upload_id.as_str()));
        }
        if manifest.windows(2).any(|pair| pair[0].part_number >= pair[1].part_number) {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                "multipart manifest must be strictly ascending by part number",
            )
            .with_context("upload_id", self.upload_id.as_str()));
        }

        let mut total = 0usize;
        for entry in manifest {
            let part = self.parts.get(&entry.part_number).ok_or_else(|| {
                ProviderError::not_found(COMPONENT, "multipart part was never uploaded")
                    .with_context("upload_id", self.upload_id.as_str())
                    .with_context("part_number", entry.part_number.to_string())
            })?;
            if !part.etag.eq_ignore_ascii_case(&entry.etag) {
                return Err(ProviderError::data_integrity(
                    COMPONENT,
                    "multipart manifest etag does not match the uploaded part",
                )
                .with_context("upload_id", self.upload_id.as_str())
                .with_context("part_number", entry.part_number.to_string()));
            }
            total += part.data.len();
        }

        if total > max_size {
            return Err(ProviderError::invalid_config(
                COMPONENT,
                format!("assembled object exceeds maximum size of {} bytes", max_size),
            )
            .with_context("upload_id", self.upload_id.as_str())
            .with_context("size", total.to_string()));
        }

        let mut assembled = BytesMut::with_capacity(total);
        for entry in manifest {
            if let Some(part) = self.parts.get(&entry.part_number) {
                assembled.extend_from_slice(&part.data);
            }
        }
        Ok(assembled.freeze())
    }
}

/// Open uploads by id
#[derive(Default)]
pub(crate) struct UploadTable {
    uploads: Mutex<HashMap<String, Arc<Mutex<MultipartUpload>>>>,
}

impl UploadTable {
    pub(crate) async fn open(
        &self,
        key: &str,
        options: CreateMultipartOptions,
        now: DateTime<Utc>,
    ) -> MultipartUploadInfo {
        let upload = MultipartUpload {
            upload_id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            options,
            created_at: now,
            parts: BTreeMap::new(),
            closed: false,
        };
        let info = upload.info();
        self.uploads
            .lock()
            .await
            .insert(info.upload_id.clone(), Arc::new(Mutex::new(upload)));
        info
    }

    pub(crate) async fn get(&self, upload_id: &str) -> Result<Arc<Mutex<MultipartUpload>>> {
        self.uploads
            .lock()
            .await
            .get(upload_id)
            .cloned()
            .ok_or_else(|| upload_not_found(upload_id))
    }

    pub(crate) async fn remove(&self, upload_id: &str) -> Option<Arc<Mutex<MultipartUpload>>> {
        self.uploads.lock().await.remove(upload_id)
    }

    pub(crate) async fn len(&self) -> usize {
        self.uploads.lock().await.len()
    }
}
