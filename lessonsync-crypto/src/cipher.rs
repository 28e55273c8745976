//! ChaCha20-Poly1305 sealing with caller-supplied nonces.
//!
//! Key stores call into this module from behind their `KeyHandle`s so the
//! raw key bytes never cross the `KeyStore` boundary.

use crate::error::{CryptoError, CryptoResult};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

/// Nonce length in bytes (96-bit, IETF variant).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Symmetric key length in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Generates a fresh random nonce from the thread-local CSPRNG.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Fills a new 256-bit key with random bytes.
pub(crate) fn generate_key_bytes() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Encrypts `plaintext` under `key` and `nonce` with no associated data.
///
/// The returned buffer is the ciphertext followed by the 16-byte tag.
pub fn seal(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Decrypts and authenticates `ciphertext` (ciphertext || tag).
pub fn open(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ciphertext too short: {} bytes",
            ciphertext.len()
        )));
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(|_| {
        CryptoError::Decryption("authentication failed (wrong key or tampered data)".to_string())
    })
}
