//! Crypto and key-custody error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by key stores and the AEAD cipher.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The platform key facility could not be reached or refused the request.
    #[error("key facility unavailable: {0}")]
    KeyUnavailable(String),

    #[error("no key named {0}")]
    KeyNotFound(String),

    #[error("unsupported key spec: {0}")]
    UnsupportedSpec(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication tag mismatch, truncated ciphertext, or wrong key.
    #[error("decryption failed: {0}")]
    Decryption(String),
}
