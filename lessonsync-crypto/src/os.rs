//! Key store backed by the host's credential facility.
//!
//! Uses the `keyring` crate (Keychain on Apple platforms, Credential Manager
//! on Windows, Secret Service on Linux). Each key is one entry under the
//! configured service name. Key bytes are read into a zeroizing buffer only
//! for the duration of a single seal/open call.
//!
//! On targets where `keyring` has no persistent backend (Android among them)
//! it silently falls back to an in-memory mock. Every call here fails with
//! [`CryptoError::KeyUnavailable`] on those targets, and a freshly generated
//! key is read back through a new entry before `generate_key` reports success.

use crate::cipher::{self, KEY_SIZE, NONCE_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::keystore::{require_purpose, KeyHandle, KeySpec, KeyStore};
use base64::{engine::general_purpose, Engine as _};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

/// Default keyring service name.
pub const DEFAULT_SERVICE: &str = "LessonSync";

/// Whether `keyring` ships a platform credential store for this target.
pub const HAS_PLATFORM_BACKEND: bool = cfg!(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows",
));

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    spec: KeySpec,
    key: String,
}

/// Production key store over the OS credential facility.
pub struct OsKeyStore {
    service: String,
}

impl OsKeyStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, name: &str) -> CryptoResult<Entry> {
        if !HAS_PLATFORM_BACKEND {
            return Err(CryptoError::KeyUnavailable(format!(
                "no platform credential store on {}",
                std::env::consts::OS
            )));
        }
        Entry::new(&self.service, name)
            .map_err(|e| CryptoError::KeyUnavailable(format!("keyring init: {e}")))
    }
}

impl Default for OsKeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

fn read_entry(entry: &Entry, name: &str) -> CryptoResult<Option<StoredEntry>> {
    match entry.get_password() {
        Ok(raw) => {
            let raw = Zeroizing::new(raw);
            let stored: StoredEntry = serde_json::from_str(&raw).map_err(|e| {
                CryptoError::KeyUnavailable(format!("malformed keyring entry {name}: {e}"))
            })?;
            Ok(Some(stored))
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(CryptoError::KeyUnavailable(format!("load key {name}: {e}"))),
    }
}

fn decode_key(stored: &StoredEntry) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    let decoded = Zeroizing::new(
        general_purpose::STANDARD
            .decode(&stored.key)
            .map_err(|e| CryptoError::KeyUnavailable(format!("decode key: {e}")))?,
    );
    if decoded.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: decoded.len(),
        });
    }
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&decoded);
    Ok(key)
}

impl KeyStore for OsKeyStore {
    fn has_key(&self, name: &str) -> CryptoResult<bool> {
        let entry = self.entry(name)?;
        Ok(read_entry(&entry, name)?.is_some())
    }

    fn generate_key(&self, name: &str, spec: &KeySpec) -> CryptoResult<()> {
        spec.validate()?;
        let entry = self.entry(name)?;
        if read_entry(&entry, name)?.is_some() {
            return Ok(());
        }

        let key = Zeroizing::new(cipher::generate_key_bytes());
        let stored = StoredEntry {
            spec: spec.clone(),
            key: general_purpose::STANDARD.encode(key.as_slice()),
        };
        let encoded = Zeroizing::new(
            serde_json::to_string(&stored)
                .map_err(|e| CryptoError::KeyUnavailable(format!("encode key entry: {e}")))?,
        );
        entry
            .set_password(&encoded)
            .map_err(|e| CryptoError::KeyUnavailable(format!("store key {name}: {e}")))?;

        // A backend that accepts writes but keeps nothing would hand out a
        // key that can never decrypt again.
        if read_entry(&self.entry(name)?, name)?.is_none() {
            return Err(CryptoError::KeyUnavailable(format!(
                "keyring service {} did not persist key {name}",
                self.service
            )));
        }

        debug!("generated key {name} in keyring service {}", self.service);
        Ok(())
    }

    fn get_key(&self, name: &str) -> CryptoResult<Box<dyn KeyHandle>> {
        let entry = self.entry(name)?;
        let stored =
            read_entry(&entry, name)?.ok_or_else(|| CryptoError::KeyNotFound(name.to_string()))?;
        Ok(Box::new(OsKeyHandle {
            name: name.to_string(),
            spec: stored.spec,
            entry,
        }))
    }

    fn delete_key(&self, name: &str) -> CryptoResult<()> {
        let entry = self.entry(name)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CryptoError::KeyUnavailable(format!("delete key {name}: {e}"))),
        }
    }
}

struct OsKeyHandle {
    name: String,
    spec: KeySpec,
    entry: Entry,
}

impl OsKeyHandle {
    fn load(&self) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
        let stored = read_entry(&self.entry, &self.name)?
            .ok_or_else(|| CryptoError::KeyNotFound(self.name.clone()))?;
        decode_key(&stored)
    }
}

impl KeyHandle for OsKeyHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn encrypt(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        require_purpose(&self.spec, true)?;
        let key = self.load()?;
        cipher::seal(&key, nonce, plaintext)
    }

    fn decrypt(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        require_purpose(&self.spec, false)?;
        let key = self.load()?;
        cipher::open(&key, nonce, ciphertext)
    }
}
