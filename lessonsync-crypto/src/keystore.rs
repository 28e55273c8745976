//! Key custody capability.
//!
//! A [`KeyStore`] generates and retains named symmetric keys and hands out
//! [`KeyHandle`]s that can encrypt and decrypt with them. Callers never see
//! the key bytes; all AEAD work happens behind the handle.

use crate::cipher::NONCE_SIZE;
use crate::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};

/// Operations a key may be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPurposes {
    pub encrypt: bool,
    pub decrypt: bool,
}

/// AEAD algorithms a key store can provision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    ChaCha20Poly1305,
}

/// Parameters for key generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub purposes: KeyPurposes,
    pub algorithm: KeyAlgorithm,
    pub key_bits: u32,
    /// Whether the key material may ever leave the store.
    pub exportable: bool,
}

impl KeySpec {
    /// Encrypt+decrypt, 256-bit AEAD, non-exportable.
    pub fn aead_256() -> Self {
        Self {
            purposes: KeyPurposes {
                encrypt: true,
                decrypt: true,
            },
            algorithm: KeyAlgorithm::ChaCha20Poly1305,
            key_bits: 256,
            exportable: false,
        }
    }

    /// Checks that a store without export support can honour this spec.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.exportable {
            return Err(CryptoError::UnsupportedSpec(
                "exportable keys are not supported".to_string(),
            ));
        }
        if self.key_bits != 256 {
            return Err(CryptoError::UnsupportedSpec(format!(
                "{}-bit keys are not supported",
                self.key_bits
            )));
        }
        if !self.purposes.encrypt && !self.purposes.decrypt {
            return Err(CryptoError::UnsupportedSpec(
                "key must allow encrypt or decrypt".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::aead_256()
    }
}

/// A usable reference to a key held by a [`KeyStore`].
pub trait KeyHandle: Send + Sync {
    /// The name the key is stored under.
    fn name(&self) -> &str;

    /// Encrypts with no associated data. Returns ciphertext || tag.
    fn encrypt(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypts and authenticates ciphertext || tag.
    fn decrypt(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Platform key facility: generates, retains and uses non-extractable keys.
pub trait KeyStore: Send + Sync {
    fn has_key(&self, name: &str) -> CryptoResult<bool>;

    /// Generates a key under `name`, replacing nothing if one already exists.
    fn generate_key(&self, name: &str, spec: &KeySpec) -> CryptoResult<()>;

    /// Returns a handle for `name`, or [`CryptoError::KeyNotFound`].
    fn get_key(&self, name: &str) -> CryptoResult<Box<dyn KeyHandle>>;

    /// Removes `name`. Removing a missing key is not an error.
    fn delete_key(&self, name: &str) -> CryptoResult<()>;
}

/// Checks a handle's purposes before use.
pub(crate) fn require_purpose(spec: &KeySpec, encrypt: bool) -> CryptoResult<()> {
    let allowed = if encrypt {
        spec.purposes.encrypt
    } else {
        spec.purposes.decrypt
    };
    if allowed {
        Ok(())
    } else {
        Err(CryptoError::UnsupportedSpec(format!(
            "key not provisioned for {}",
            if encrypt { "encryption" } else { "decryption" }
        )))
    }
}
