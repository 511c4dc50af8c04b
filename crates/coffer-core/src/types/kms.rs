//! Key management types

use crate::types::secret_value::SecretValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a key may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyUsage {
    EncryptDecrypt,
    SignVerify,
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyUsage::EncryptDecrypt => write!(f, "ENCRYPT_DECRYPT"),
            KeyUsage::SignVerify => write!(f, "SIGN_VERIFY"),
        }
    }
}

/// Key algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyAlgorithm {
    /// AES-256-GCM, 12-byte nonce (default for ENCRYPT_DECRYPT)
    #[serde(rename = "AES_256_GCM")]
    Aes256Gcm,
    /// XChaCha20-Poly1305, 24-byte nonce
    #[serde(rename = "XCHACHA20_POLY1305")]
    XChaCha20Poly1305,
    /// ECDSA over P-256 with SHA-256 (default for SIGN_VERIFY)
    #[serde(rename = "ECDSA_P256_SHA256")]
    EcdsaP256Sha256,
    /// Ed25519
    Ed25519,
}

impl KeyAlgorithm {
    /// The usage this algorithm serves
    pub fn usage(&self) -> KeyUsage {
        match self {
            KeyAlgorithm::Aes256Gcm | KeyAlgorithm::XChaCha20Poly1305 => KeyUsage::EncryptDecrypt,
            KeyAlgorithm::EcdsaP256Sha256 | KeyAlgorithm::Ed25519 => KeyUsage::SignVerify,
        }
    }

    /// Default algorithm for a usage
    pub fn default_for(usage: KeyUsage) -> Self {
        match usage {
            KeyUsage::EncryptDecrypt => KeyAlgorithm::Aes256Gcm,
            KeyUsage::SignVerify => KeyAlgorithm::EcdsaP256Sha256,
        }
    }

    /// Nonce length for AEAD algorithms
    pub fn nonce_len(&self) -> Option<usize> {
        match self {
            KeyAlgorithm::Aes256Gcm => Some(12),
            KeyAlgorithm::XChaCha20Poly1305 => Some(24),
            _ => None,
        }
    }

    /// AEAD algorithm identified by its nonce length
    pub fn from_nonce_len(len: usize) -> Option<Self> {
        match len {
            12 => Some(KeyAlgorithm::Aes256Gcm),
            24 => Some(KeyAlgorithm::XChaCha20Poly1305),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Aes256Gcm => write!(f, "AES_256_GCM"),
            KeyAlgorithm::XChaCha20Poly1305 => write!(f, "XCHACHA20_POLY1305"),
            KeyAlgorithm::EcdsaP256Sha256 => write!(f, "ECDSA_P256_SHA256"),
            KeyAlgorithm::Ed25519 => write!(f, "ED25519"),
        }
    }
}

/// Key lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Enabled,
    Disabled,
    /// Terminal; every operation on the key is refused
    PendingDeletion,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyState::Enabled => write!(f, "Enabled"),
            KeyState::Disabled => write!(f, "Disabled"),
            KeyState::PendingDeletion => write!(f, "PendingDeletion"),
        }
    }
}

/// Parameters for creating a key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    pub usage: KeyUsage,
    /// Algorithm hint; the usage default applies when absent
    #[serde(default)]
    pub algorithm: Option<KeyAlgorithm>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl CreateKeyRequest {
    /// Request with only a usage set
    pub fn new(usage: KeyUsage) -> Self {
        Self {
            usage,
            algorithm: None,
            alias: None,
            description: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Key metadata; never contains key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub key_id: String,
    pub alias: Option<String>,
    pub algorithm: KeyAlgorithm,
    pub usage: KeyUsage,
    pub state: KeyState,
    /// Current (encrypting/signing) version
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Set once the key is pending deletion
    pub deletion_date: Option<DateTime<Utc>>,
    /// Public key (SEC1 or raw Ed25519 bytes) for SIGN_VERIFY keys
    pub public_key: Option<Vec<u8>>,
}

/// Result of an encrypt call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptOutput {
    /// Serialized envelope
    pub ciphertext: Vec<u8>,
    pub key_id: String,
    pub key_version: u32,
    pub algorithm: KeyAlgorithm,
}

/// Result of a decrypt call
#[derive(Debug, Clone)]
pub struct DecryptOutput {
    pub plaintext: SecretValue,
    pub key_id: String,
    pub key_version: u32,
}

/// Result of a sign call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutput {
    pub signature: Vec<u8>,
    pub key_id: String,
    pub key_version: u32,
    pub algorithm: KeyAlgorithm,
}

/// A freshly generated data key and its envelope
#[derive(Debug, Clone)]
pub struct DataKey {
    /// Plaintext data key for local use; discard after use
    pub plaintext: SecretValue,
    /// Envelope that decrypts back to `plaintext` through the KMS
    pub ciphertext: Vec<u8>,
    pub key_id: String,
    pub key_version: u32,
}
