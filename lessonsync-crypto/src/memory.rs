//! In-process key store for tests and ephemeral sessions.

use crate::cipher::{self, KEY_SIZE, NONCE_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::keystore::{require_purpose, KeyHandle, KeySpec, KeyStore};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use zeroize::Zeroizing;

struct StoredKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
    spec: KeySpec,
}

/// Keys live in process memory and vanish with the store.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, Arc<StoredKey>>>,
    unavailable: bool,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails with [`CryptoError::KeyUnavailable`],
    /// standing in for a device without a working key facility.
    pub fn unavailable() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            unavailable: true,
        }
    }

    fn check_available(&self) -> CryptoResult<()> {
        if self.unavailable {
            Err(CryptoError::KeyUnavailable("memory key store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn has_key(&self, name: &str) -> CryptoResult<bool> {
        self.check_available()?;
        let keys = self
            .keys
            .read()
            .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;
        Ok(keys.contains_key(name))
    }

    fn generate_key(&self, name: &str, spec: &KeySpec) -> CryptoResult<()> {
        self.check_available()?;
        spec.validate()?;
        let mut keys = self
            .keys
            .write()
            .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;
        keys.entry(name.to_string()).or_insert_with(|| {
            Arc::new(StoredKey {
                bytes: Zeroizing::new(cipher::generate_key_bytes()),
                spec: spec.clone(),
            })
        });
        Ok(())
    }

    fn get_key(&self, name: &str) -> CryptoResult<Box<dyn KeyHandle>> {
        self.check_available()?;
        let keys = self
            .keys
            .read()
            .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;
        let key = keys
            .get(name)
            .cloned()
            .ok_or_else(|| CryptoError::KeyNotFound(name.to_string()))?;
        Ok(Box::new(MemoryKeyHandle {
            name: name.to_string(),
            key,
        }))
    }

    fn delete_key(&self, name: &str) -> CryptoResult<()> {
        self.check_available()?;
        let mut keys = self
            .keys
            .write()
            .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;
        keys.remove(name);
        Ok(())
    }
}

struct MemoryKeyHandle {
    name: String,
    key: Arc<StoredKey>,
}

impl KeyHandle for MemoryKeyHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn encrypt(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        require_purpose(&self.key.spec, true)?;
        cipher::seal(&self.key.bytes, nonce, plaintext)
    }

    fn decrypt(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        require_purpose(&self.key.spec, false)?;
        cipher::open(&self.key.bytes, nonce, ciphertext)
    }
}
