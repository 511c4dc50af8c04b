//! Secret byte containers that are zeroed on drop and never printed

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that is automatically zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    inner: Vec<u8>,
}

impl SecretValue {
    /// Create a new secret value from raw bytes
    pub fn new(value: Vec<u8>) -> Self {
        Self { inner: value }
    }

    /// Get the raw bytes (use with caution)
    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    /// Get the value as UTF-8 text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.inner).ok()
    }

    /// Convert to owned bytes (consumes self)
    pub fn into_bytes(mut self) -> Vec<u8> {
        std::mem::take(&mut self.inner)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<Vec<u8>> for SecretValue {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for SecretValue {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue([REDACTED {} bytes])", self.len())
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_text() {
        let value = SecretValue::from("s3cr3t");
        assert_eq!(value.as_str(), Some("s3cr3t"));
        assert_eq!(value.len(), 6);
        assert_eq!(value.into_bytes(), b"s3cr3t".to_vec());
    }

    #[test]
    fn test_secret_value_binary() {
        let value = SecretValue::from(vec![0xff, 0xfe]);
        assert_eq!(value.as_str(), None);
        assert_eq!(value.expose(), &[0xff, 0xfe]);
    }

    #[test]
    fn test_secret_value_debug() {
        let value = SecretValue::from("sensitive");
        let debug_str = format!("{:?}", value);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("sensitive"));
        assert_eq!(format!("{}", value), "[REDACTED]");
    }
}
