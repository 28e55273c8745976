//! On-disk credential record layout: `nonce (12 bytes) || ciphertext`.
//!
//! No header, magic, or version field.

use crate::{VaultError, VaultResult};
use lessonsync_crypto::NONCE_SIZE;

/// A sealed credential as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub nonce: [u8; NONCE_SIZE],
    /// ChaCha20-Poly1305 ciphertext followed by the 16-byte tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedRecord {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Splits stored bytes into nonce prefix and ciphertext remainder.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() < NONCE_SIZE {
            return Err(VaultError::CredentialCorrupted(format!(
                "record is {} bytes, shorter than the {NONCE_SIZE}-byte nonce",
                bytes.len()
            )));
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_nonce_then_ciphertext() {
        let record = EncryptedRecord {
            nonce: [9u8; NONCE_SIZE],
            ciphertext: vec![1, 2, 3],
        };
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), NONCE_SIZE + 3);
        assert_eq!(&bytes[..NONCE_SIZE], &[9u8; NONCE_SIZE]);
        assert_eq!(&bytes[NONCE_SIZE..], &[1, 2, 3]);
        assert_eq!(EncryptedRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn short_record_is_corrupted() {
        let err = EncryptedRecord::from_bytes(&[0u8; NONCE_SIZE - 1]).unwrap_err();
        assert!(matches!(err, VaultError::CredentialCorrupted(_)));
    }

    #[test]
    fn nonce_only_record_parses_with_empty_ciphertext() {
        let record = EncryptedRecord::from_bytes(&[0u8; NONCE_SIZE]).unwrap();
        assert!(record.ciphertext.is_empty());
    }
}
