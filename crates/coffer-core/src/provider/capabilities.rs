//! Capability negotiation

use crate::types::KeyAlgorithm;
use serde::{Deserialize, Serialize};

/// KMS feature flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmsCapabilities {
    pub algorithms: Vec<KeyAlgorithm>,
    pub key_rotation: bool,
    pub key_deletion: bool,
    pub data_keys: bool,
}

/// Secret store feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCapabilities {
    pub labels: bool,
    pub version_listing: bool,
    pub rotation: bool,
    pub metadata_updates: bool,
}

/// Blob storage feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobCapabilities {
    pub range_reads: bool,
    pub conditional_reads: bool,
    pub multipart: bool,
    pub signed_urls: bool,
    pub copy: bool,
    pub eventual_consistency: bool,
}

/// A single negotiable operation or feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Kms,
    Algorithm(KeyAlgorithm),
    KeyRotation,
    KeyDeletion,
    DataKeys,
    Secrets,
    SecretLabels,
    SecretVersionListing,
    SecretRotation,
    SecretMetadataUpdates,
    Blob,
    RangeReads,
    ConditionalReads,
    Multipart,
    SignedUrls,
    CopyObject,
    EventualConsistency,
}

/// Capabilities advertised by a provider; an absent family is `None`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub kms: Option<KmsCapabilities>,
    pub secrets: Option<SecretCapabilities>,
    pub blob: Option<BlobCapabilities>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_kms(mut self, kms: KmsCapabilities) -> Self {
        self.kms = Some(kms);
        self
    }

    pub fn with_secrets(mut self, secrets: SecretCapabilities) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn with_blob(mut self, blob: BlobCapabilities) -> Self {
        self.blob = Some(blob);
        self
    }

    /// Whether the provider supports a capability
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Kms => self.kms.is_some(),
            Capability::Algorithm(algorithm) => self
                .kms
                .as_ref()
                .is_some_and(|k| k.algorithms.contains(&algorithm)),
            Capability::KeyRotation => self.kms.as_ref().is_some_and(|k| k.key_rotation),
            Capability::KeyDeletion => self.kms.as_ref().is_some_and(|k| k.key_deletion),
            Capability::DataKeys => self.kms.as_ref().is_some_and(|k| k.data_keys),
            Capability::Secrets => self.secrets.is_some(),
            Capability::SecretLabels => self.secrets.is_some_and(|s| s.labels),
            Capability::SecretVersionListing => self.secrets.is_some_and(|s| s.version_listing),
            Capability::SecretRotation => self.secrets.is_some_and(|s| s.rotation),
            Capability::SecretMetadataUpdates => self.secrets.is_some_and(|s| s.metadata_updates),
            Capability::Blob => self.blob.is_some(),
            Capability::RangeReads => self.blob.is_some_and(|b| b.range_reads),
            Capability::ConditionalReads => self.blob.is_some_and(|b| b.conditional_reads),
            Capability::Multipart => self.blob.is_some_and(|b| b.multipart),
            Capability::SignedUrls => self.blob.is_some_and(|b| b.signed_urls),
            Capability::CopyObject => self.blob.is_some_and(|b| b.copy),
            Capability::EventualConsistency => self.blob.is_some_and(|b| b.eventual_consistency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_family_supports_nothing() {
        let caps = Capabilities::none().with_secrets(SecretCapabilities {
            labels: true,
            version_listing: false,
            rotation: false,
            metadata_updates: false,
        });

        assert!(caps.supports(Capability::Secrets));
        assert!(caps.supports(Capability::SecretLabels));
        assert!(!caps.supports(Capability::SecretVersionListing));
        assert!(!caps.supports(Capability::Kms));
        assert!(!caps.supports(Capability::Multipart));
        assert!(!caps.supports(Capability::Algorithm(KeyAlgorithm::Ed25519)));
    }

    #[test]
    fn test_algorithm_support() {
        let caps = Capabilities::none().with_kms(KmsCapabilities {
            algorithms: vec![KeyAlgorithm::Aes256Gcm],
            key_rotation: true,
            key_deletion: false,
            data_keys: true,
        });
        assert!(caps.supports(Capability::Algorithm(KeyAlgorithm::Aes256Gcm)));
        assert!(!caps.supports(Capability::Algorithm(KeyAlgorithm::XChaCha20Poly1305)));
        assert!(caps.supports(Capability::KeyRotation));
        assert!(!caps.supports(Capability::KeyDeletion));
    }
}
