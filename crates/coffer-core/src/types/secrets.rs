//! Versioned secret storage types

use crate::error::{ProviderError, Result};
use crate::types::pagination::PageRequest;
use crate::types::secret_value::SecretValue;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9/_+=.@-]{1,512}$").expect("secret name regex is valid")
});

/// Reject names outside `[A-Za-z0-9/_+=.@-]{1,512}`
///
/// Every secret store runs this before touching its backend.
pub fn validate_secret_name(name: &str) -> Result<()> {
    if !NAME_RE.is_match(name) {
        return Err(ProviderError::invalid_config(
            "secrets",
            "secret name must be 1-512 characters of [A-Za-z0-9/_+=.@-]",
        )
        .with_context("name", name));
    }
    Ok(())
}

/// Descriptor of the external mechanism a rotation should invoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RotationHook {
    /// Hook kind, e.g. `webhook`
    pub kind: String,
    /// Target of the hook (URL, function name, ...)
    pub target: String,
}

impl RotationHook {
    /// A webhook rotation hook
    pub fn webhook(url: impl Into<String>) -> Self {
        Self {
            kind: "webhook".to_string(),
            target: url.into(),
        }
    }
}

/// Options for writing a secret version
#[derive(Debug, Clone, Default)]
pub struct PutSecretOptions {
    /// Caller supplied version; generated when absent
    pub version: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub description: Option<String>,
    pub rotation_hook: Option<RotationHook>,
}

impl PutSecretOptions {
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_rotation_hook(mut self, hook: RotationHook) -> Self {
        self.rotation_hook = Some(hook);
        self
    }
}

/// A secret version together with its value
#[derive(Debug, Clone)]
pub struct Secret {
    pub name: String,
    pub version: String,
    pub value: SecretValue,
    pub created_at: DateTime<Utc>,
    pub labels: BTreeMap<String, String>,
    pub description: Option<String>,
}

/// Metadata of a single secret version (no value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersionInfo {
    pub name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub labels: BTreeMap<String, String>,
    pub description: Option<String>,
    pub is_latest: bool,
}

/// Listing entry for a secret record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSummary {
    pub name: String,
    pub latest_version: String,
    pub version_count: usize,
    pub labels: BTreeMap<String, String>,
    pub description: Option<String>,
    pub rotation_hook: Option<RotationHook>,
    pub updated_at: DateTime<Utc>,
}

/// Filter and paging for secret listings
#[derive(Debug, Clone, Default)]
pub struct ListSecretsRequest {
    pub prefix: Option<String>,
    /// Every entry must match exactly
    pub labels: BTreeMap<String, String>,
    pub page: PageRequest,
}

impl ListSecretsRequest {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// Metadata-only update of a secret record
#[derive(Debug, Clone, Default)]
pub struct SecretMetadataUpdate {
    pub labels: Option<BTreeMap<String, String>>,
    pub description: Option<String>,
    pub rotation_hook: Option<RotationHook>,
}

/// Check that every filter label is present with the same value
pub fn labels_match(labels: &BTreeMap<String, String>, filter: &BTreeMap<String, String>) -> bool {
    filter
        .iter()
        .all(|(key, value)| labels.get(key).is_some_and(|v| v == value))
}
