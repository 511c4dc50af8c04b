//! KMS envelope wire format
//!
//! An envelope is self-describing; every variable-length field is prefixed
//! with its big-endian `u32` length:
//!
//! ```text
//! [version:u32][keyIdLen:u32][keyId][ivLen:u32][iv][tagLen:u32][tag][aadLen:u32][aad][ciphertext...]
//! ```
//!
//! The AEAD algorithm is not stored; it follows from the iv length
//! (12 bytes for AES-256-GCM, 24 bytes for XChaCha20-Poly1305). The key id
//! field carries `<keyId>@<version>` so older key versions can be selected.

use crate::error::{ProviderError, Result};
use crate::types::KeyAlgorithm;

const COMPONENT: &str = "envelope";

/// Current envelope format version
pub const ENVELOPE_FORMAT_VERSION: u32 = 1;

/// Separator between key id and key version in the key id field
pub const KEY_VERSION_SEPARATOR: char = '@';

/// Length of the AEAD authentication tag
pub const TAG_LEN: usize = 16;

/// A parsed envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub format_version: u32,
    /// Raw key id field, `<keyId>@<version>`
    pub key_ref: String,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub aad: Option<Vec<u8>>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Build a current-format envelope for a key version
    pub fn new(
        key_id: &str,
        key_version: u32,
        iv: Vec<u8>,
        tag: Vec<u8>,
        aad: Option<Vec<u8>>,
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            format_version: ENVELOPE_FORMAT_VERSION,
            key_ref: format_key_ref(key_id, key_version),
            iv,
            tag,
            aad,
            ciphertext,
        }
    }

    /// AEAD algorithm implied by the iv length
    pub fn algorithm(&self) -> Result<KeyAlgorithm> {
        KeyAlgorithm::from_nonce_len(self.iv.len()).ok_or_else(|| {
            ProviderError::data_integrity(COMPONENT, "envelope iv length matches no algorithm")
                .with_context("iv_len", self.iv.len().to_string())
        })
    }

    /// Key id and version from the key id field
    pub fn key_id_and_version(&self) -> Result<(&str, u32)> {
        parse_key_ref(&self.key_ref)
    }

    /// Serialize into wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let aad = self.aad.as_deref().unwrap_or_default();
        let mut out = Vec::with_capacity(
            20 + self.key_ref.len()
                + self.iv.len()
                + self.tag.len()
                + aad.len()
                + self.ciphertext.len(),
        );
        out.extend_from_slice(&self.format_version.to_be_bytes());
        write_field(&mut out, "key_id", self.key_ref.as_bytes())?;
        write_field(&mut out, "iv", &self.iv)?;
        write_field(&mut out, "tag", &self.tag)?;
        write_field(&mut out, "aad", aad)?;
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    /// Parse wire bytes; any structural problem is a data-integrity failure
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let format_version = reader.read_u32("version")?;
        if format_version != ENVELOPE_FORMAT_VERSION {
            return Err(ProviderError::data_integrity(
                COMPONENT,
                "unsupported envelope format version",
            )
            .with_context("format_version", format_version.to_string()));
        }

        let key_ref = String::from_utf8(reader.read_field("key_id")?.to_vec()).map_err(|e| {
            ProviderError::data_integrity(COMPONENT, "envelope key id is not valid UTF-8")
                .with_source(e)
        })?;
        let iv = reader.read_field("iv")?.to_vec();
        let tag = reader.read_field("tag")?.to_vec();
        let aad = reader.read_field("aad")?;
        let aad = (!aad.is_empty()).then(|| aad.to_vec());
        let ciphertext = reader.rest().to_vec();

        Ok(Self {
            format_version,
            key_ref,
            iv,
            tag,
            aad,
            ciphertext,
        })
    }
}

/// `<keyId>@<version>`
pub fn format_key_ref(key_id: &str, version: u32) -> String {
    format!("{}{}{}", key_id, KEY_VERSION_SEPARATOR, version)
}

/// Split a `<keyId>@<version>` key reference
pub fn parse_key_ref(key_ref: &str) -> Result<(&str, u32)> {
    let invalid = || {
        ProviderError::data_integrity(COMPONENT, "malformed envelope key reference")
            .with_context("key_ref", key_ref)
    };
    let (key_id, version) = key_ref.rsplit_once(KEY_VERSION_SEPARATOR).ok_or_else(invalid)?;
    if key_id.is_empty() {
        return Err(invalid());
    }
    let version = version.parse::<u32>().map_err(|_| invalid())?;
    Ok((key_id, version))
}

fn write_field(out: &mut Vec<u8>, name: &str, field: &[u8]) -> Result<()> {
    let len = u32::try_from(field.len()).map_err(|_| {
        ProviderError::invalid_config(COMPONENT, "envelope field too large")
            .with_context("field", name)
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(field);
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(
                ProviderError::data_integrity(COMPONENT, "truncated envelope")
                    .with_context("field", field),
            ),
        }
    }

    fn read_u32(&mut self, field: &str) -> Result<u32> {
        let raw = self.take(4, field)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(raw);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_field(&mut self, field: &str) -> Result<&'a [u8]> {
        let len = self.read_u32(field)? as usize;
        self.take(len, field)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> Envelope {
        Envelope::new(
            "key-123",
            2,
            vec![7u8; 12],
            vec![9u8; TAG_LEN],
            Some(b"context".to_vec()),
            b"opaque".to_vec(),
        )
    }

    #[test]
    fn test_layout_is_length_prefixed_big_endian() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &1u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &9u32.to_be_bytes());
        assert_eq!(&bytes[8..17], b"key-123@2");
        assert_eq!(&bytes[17..21], &12u32.to_be_bytes());
        assert!(bytes.ends_with(b"opaque"));
    }

    #[test]
    fn test_parse_restores_fields() {
        let envelope = sample();
        let parsed = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(parsed.key_id_and_version().unwrap(), ("key-123", 2));
        assert_eq!(parsed.algorithm().unwrap(), KeyAlgorithm::Aes256Gcm);
    }

    #[test]
    fn test_empty_aad_is_absent() {
        let mut envelope = sample();
        envelope.aad = None;
        let parsed = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.aad, None);
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let bytes = sample().to_bytes().unwrap();
        for cut in [0, 3, 10, 20] {
            let err = Envelope::from_bytes(&bytes[..cut]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        }
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    }

    #[test]
    fn test_unknown_format_version_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0..4].copy_from_slice(&2u32.to_be_bytes());
        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    }

    #[test]
    fn test_unknown_iv_length_has_no_algorithm() {
        let mut envelope = sample();
        envelope.iv = vec![0u8; 16];
        assert_eq!(envelope.algorithm().unwrap_err().kind(), ErrorKind::DataIntegrity);
    }

    #[test]
    fn test_key_ref_parsing() {
        assert_eq!(parse_key_ref("abc@10").unwrap(), ("abc", 10));
        assert!(parse_key_ref("abc").is_err());
        assert!(parse_key_ref("@1").is_err());
        assert!(parse_key_ref("abc@x").is_err());
    }
}
