//! Key generation, AEAD sealing and signatures

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use coffer_core::envelope::TAG_LEN;
use coffer_core::types::KeyAlgorithm;
use coffer_core::{ProviderError, Result};
use rand::RngCore;
use zeroize::Zeroizing;

const COMPONENT: &str = "kms";

/// Symmetric key length for both AEAD algorithms
pub(crate) const AEAD_KEY_LEN: usize = 32;

/// Private key material of one key version
pub(crate) enum KeyMaterial {
    Aead(Zeroizing<Vec<u8>>),
    EcdsaP256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl KeyMaterial {
    /// Fresh material for an algorithm
    pub(crate) fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Aes256Gcm | KeyAlgorithm::XChaCha20Poly1305 => {
                let mut key = Zeroizing::new(vec![0u8; AEAD_KEY_LEN]);
                rand::thread_rng().fill_bytes(key.as_mut_slice());
                KeyMaterial::Aead(key)
            }
            KeyAlgorithm::EcdsaP256Sha256 => {
                KeyMaterial::EcdsaP256(p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
            }
            KeyAlgorithm::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                rand::thread_rng().fill_bytes(&mut *seed);
                KeyMaterial::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
            }
        }
    }

    /// Public half of an asymmetric key (SEC1 uncompressed or raw Ed25519)
    pub(crate) fn public_key(&self) -> Option<Vec<u8>> {
        match self {
            KeyMaterial::Aead(_) => None,
            KeyMaterial::EcdsaP256(key) => Some(
                key.verifying_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec(),
            ),
            KeyMaterial::Ed25519(key) => Some(key.verifying_key().as_bytes().to_vec()),
        }
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyMaterial::EcdsaP256(key) => {
                use p256::ecdsa::signature::Signer;
                let signature: p256::ecdsa::Signature = key.sign(message);
                Ok(signature.to_bytes().to_vec())
            }
            KeyMaterial::Ed25519(key) => {
                use ed25519_dalek::Signer;
                Ok(key.sign(message).to_bytes().to_vec())
            }
            KeyMaterial::Aead(_) => Err(ProviderError::permission_denied(
                COMPONENT,
                "symmetric keys cannot sign",
            )),
        }
    }

    /// Malformed signatures verify as false
    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            KeyMaterial::EcdsaP256(key) => {
                use p256::ecdsa::signature::Verifier;
                match p256::ecdsa::Signature::from_slice(signature) {
                    Ok(signature) => key.verifying_key().verify(message, &signature).is_ok(),
                    Err(_) => false,
                }
            }
            KeyMaterial::Ed25519(key) => {
                use ed25519_dalek::Verifier;
                match ed25519_dalek::Signature::from_slice(signature) {
                    Ok(signature) => key.verifying_key().verify(message, &signature).is_ok(),
                    Err(_) => false,
                }
            }
            KeyMaterial::Aead(_) => false,
        }
    }

    fn aead_key(&self) -> Result<&[u8]> {
        match self {
            KeyMaterial::Aead(key) => Ok(key.as_slice()),
            _ => Err(ProviderError::permission_denied(
                COMPONENT,
                "asymmetric keys cannot encrypt or decrypt",
            )),
        }
    }
}

/// Output of an AEAD seal, split the way the envelope stores it
pub(crate) struct Sealed {
    pub(crate) iv: Vec<u8>,
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) tag: Vec<u8>,
}

/// Encrypt with a fresh random nonce
pub(crate) fn seal(
    algorithm: KeyAlgorithm,
    material: &KeyMaterial,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Sealed> {
    let key = material.aead_key()?;
    let nonce_len = algorithm.nonce_len().ok_or_else(|| {
        ProviderError::permission_denied(COMPONENT, format!("{} is not an AEAD algorithm", algorithm))
    })?;

    let mut iv = vec![0u8; nonce_len];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut sealed = match algorithm {
        KeyAlgorithm::Aes256Gcm => aead_encrypt::<aes_gcm::Aes256Gcm>(key, &iv, plaintext, aad)?,
        _ => aead_encrypt::<chacha20poly1305::XChaCha20Poly1305>(key, &iv, plaintext, aad)?,
    };

    if sealed.len() < TAG_LEN {
        return Err(ProviderError::internal(COMPONENT, "AEAD output shorter than its tag"));
    }
    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    Ok(Sealed {
        iv,
        ciphertext: sealed,
        tag,
    })
}

/// Decrypt and authenticate; any failure is a data-integrity error
pub(crate) fn open(
    algorithm: KeyAlgorithm,
    material: &KeyMaterial,
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let key = material.aead_key()?;
    if algorithm.nonce_len() != Some(iv.len()) || tag.len() != TAG_LEN {
        return Err(ProviderError::data_integrity(
            COMPONENT,
            "envelope iv or tag length does not match the key algorithm",
        ));
    }

    let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    let plaintext = match algorithm {
        KeyAlgorithm::Aes256Gcm => aead_decrypt::<aes_gcm::Aes256Gcm>(key, iv, &combined, aad),
        _ => aead_decrypt::<chacha20poly1305::XChaCha20Poly1305>(key, iv, &combined, aad),
    }?;
    Ok(Zeroizing::new(plaintext))
}

fn aead_encrypt<C>(key: &[u8], nonce: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + KeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|_| ProviderError::internal(COMPONENT, "invalid AEAD key length"))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), Payload { msg, aad })
        .map_err(|e| ProviderError::internal(COMPONENT, format!("encryption failed: {}", e)))
}

fn aead_decrypt<C>(key: &[u8], nonce: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + KeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|_| ProviderError::internal(COMPONENT, "invalid AEAD key length"))?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| ProviderError::data_integrity(COMPONENT, "ciphertext authentication failed"))
}
