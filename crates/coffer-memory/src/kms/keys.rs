//! Key records and the key table

use super::cipher::KeyMaterial;
use chrono::{DateTime, Utc};
use coffer_core::types::{KeyAlgorithm, KeyMetadata, KeyState, KeyUsage};
use coffer_core::{ProviderError, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

const COMPONENT: &str = "kms";

/// Prefix every alias must carry
pub(crate) const ALIAS_PREFIX: &str = "alias/";

static ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^alias/[A-Za-z0-9/_-]+$").expect("alias regex is valid"));

/// Reject aliases outside `alias/[A-Za-z0-9/_-]+`
pub(crate) fn validate_alias(alias: &str) -> Result<()> {
    if alias.len() > 256 || !ALIAS_RE.is_match(alias) {
        return Err(ProviderError::invalid_config(
            COMPONENT,
            "alias must match alias/[A-Za-z0-9/_-]+ and be at most 256 characters",
        )
        .with_context("alias", alias));
    }
    Ok(())
}

/// Material of one key version
pub(crate) struct KeyVersion {
    pub(crate) material: KeyMaterial,
}

/// A key with all retained versions
pub(crate) struct KeyRecord {
    pub(crate) key_id: String,
    pub(crate) alias: Option<String>,
    pub(crate) algorithm: KeyAlgorithm,
    pub(crate) usage: KeyUsage,
    pub(crate) state: KeyState,
    pub(crate) description: Option<String>,
    pub(crate) tags: BTreeMap<String, String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) rotated_at: Option<DateTime<Utc>>,
    pub(crate) deletion_date: Option<DateTime<Utc>>,
    pub(crate) current_version: u32,
    pub(crate) versions: BTreeMap<u32, KeyVersion>,
}

impl KeyRecord {
    pub(crate) fn current(&self) -> Result<&KeyVersion> {
        self.versions.get(&self.current_version).ok_or_else(|| {
            ProviderError::internal(COMPONENT, "current key version is missing")
                .with_context("key_id", self.key_id.as_str())
        })
    }

    /// A retained version
    pub(crate) fn version(&self, version: u32) -> Result<&KeyVersion> {
        self.versions.get(&version).ok_or_else(|| {
            ProviderError::data_integrity(COMPONENT, "key version referenced by envelope is not retained")
                .with_context("key_id", self.key_id.as_str())
                .with_context("version", version.to_string())
        })
    }

    /// Refuse use while disabled or pending deletion, or for the wrong usage
    pub(crate) fn ensure_usable(&self, usage: KeyUsage) -> Result<()> {
        match self.state {
            KeyState::Enabled => {}
            state => {
                return Err(ProviderError::permission_denied(
                    COMPONENT,
                    format!("key is {}", state),
                )
                .with_context("key_id", self.key_id.as_str())
                .with_context("state", state.to_string()));
            }
        }
        if self.usage != usage {
            return Err(ProviderError::permission_denied(
                COMPONENT,
                format!("key usage is {}, operation requires {}", self.usage, usage),
            )
            .with_context("key_id", self.key_id.as_str()));
        }
        Ok(())
    }

    pub(crate) fn metadata(&self) -> KeyMetadata {
        KeyMetadata {
            key_id: self.key_id.clone(),
            alias: self.alias.clone(),
            algorithm: self.algorithm,
            usage: self.usage,
            state: self.state,
            version: self.current_version,
            created_at: self.created_at,
            rotated_at: self.rotated_at,
            description: self.description.clone(),
            tags: self.tags.clone(),
            deletion_date: self.deletion_date,
            public_key: self
                .versions
                .get(&self.current_version)
                .and_then(|v| v.material.public_key()),
        }
    }
}

/// Keys by id plus the alias index
#[derive(Default)]
pub(crate) struct KeyTable {
    pub(crate) keys: BTreeMap<String, KeyRecord>,
    pub(crate) aliases: HashMap<String, String>,
}

impl KeyTable {
    /// Resolve a key id or alias to a key id
    pub(crate) fn resolve_id(&self, key_id_or_alias: &str) -> Result<String> {
        let key_id = if key_id_or_alias.starts_with(ALIAS_PREFIX) {
            self.aliases.get(key_id_or_alias).cloned()
        } else if self.keys.contains_key(key_id_or_alias) {
            Some(key_id_or_alias.to_string())
        } else {
            None
        };
        key_id.ok_or_else(|| {
            ProviderError::not_found(COMPONENT, "key not found").with_context("key_id", key_id_or_alias)
        })
    }

    pub(crate) fn get(&self, key_id_or_alias: &str) -> Result<&KeyRecord> {
        let key_id = self.resolve_id(key_id_or_alias)?;
        self.keys.get(&key_id).ok_or_else(|| {
            ProviderError::not_found(COMPONENT, "key not found").with_context("key_id", key_id_or_alias)
        })
    }

    pub(crate) fn get_mut(&mut self, key_id_or_alias: &str) -> Result<&mut KeyRecord> {
        let key_id = self.resolve_id(key_id_or_alias)?;
        self.keys.get_mut(&key_id).ok_or_else(|| {
            ProviderError::not_found(COMPONENT, "key not found").with_context("key_id", key_id_or_alias)
        })
    }
}
