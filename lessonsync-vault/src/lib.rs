//! Encrypted-at-rest storage for exactly one credential blob.
//!
//! The blob is sealed with ChaCha20-Poly1305 under a key that lives in a
//! [`KeyStore`]; the vault only ever holds a [`KeyHandle`](lessonsync_crypto::KeyHandle).
//! The sealed record is one file on disk, replaced atomically on every save.

mod credential;
mod record;

pub use credential::Credential;
pub use record::EncryptedRecord;

use lessonsync_crypto::{generate_nonce, CryptoError, KeySpec, KeyStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The platform key facility is unavailable. Not retryable from here.
    #[error("key provisioning failed: {0}")]
    KeyProvisioning(String),
    /// The stored record cannot be read back. Re-provisioning fixes it.
    #[error("stored credential is corrupted: {0}")]
    CredentialCorrupted(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl VaultError {
    /// Whether the caller can recover without platform intervention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, VaultError::KeyProvisioning(_))
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

fn key_err(e: CryptoError) -> VaultError {
    VaultError::KeyProvisioning(e.to_string())
}

fn io_err(context: &str, path: &Path, e: std::io::Error) -> VaultError {
    VaultError::Storage(format!("{context} {}: {e}", path.display()))
}

// ============================================================================
// Configuration
// ============================================================================

/// Default key name inside the key store.
pub const DEFAULT_KEY_NAME: &str = "LessonSyncCredentials";

/// Default record file name.
pub const DEFAULT_RECORD_FILE: &str = "encrypted_credentials.dat";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Path of the sealed credential record.
    pub record_path: PathBuf,
    /// Name of the vault key inside the key store.
    pub key_name: String,
}

impl VaultConfig {
    /// Default file and key names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            record_path: dir.as_ref().join(DEFAULT_RECORD_FILE),
            key_name: DEFAULT_KEY_NAME.to_string(),
        }
    }
}

// ============================================================================
// CredentialVault
// ============================================================================

/// Single-record credential vault.
///
/// All record I/O is serialized through one mutex; the record and the key
/// name are process-wide singletons.
pub struct CredentialVault {
    config: VaultConfig,
    keystore: Arc<dyn KeyStore>,
    io_lock: Mutex<()>,
}

impl CredentialVault {
    pub fn new(config: VaultConfig, keystore: Arc<dyn KeyStore>) -> Self {
        Self {
            config,
            keystore,
            io_lock: Mutex::new(()),
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.config.record_path
    }

    /// The guarded value is `()`, so a poisoned lock carries no broken state.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.io_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Generates the vault key if the key store does not have it yet.
    ///
    /// A generated key must be retrievable afterwards; a key store that
    /// forgets it is reported as `KeyProvisioning`.
    pub fn ensure_key(&self) -> VaultResult<()> {
        let name = &self.config.key_name;
        if self.keystore.has_key(name).map_err(key_err)? {
            return Ok(());
        }
        self.keystore
            .generate_key(name, &KeySpec::aead_256())
            .map_err(key_err)?;
        self.keystore.get_key(name).map_err(|e| {
            VaultError::KeyProvisioning(format!("generated key {name} is not retrievable: {e}"))
        })?;
        info!("provisioned vault key {name}");
        Ok(())
    }

    /// Seals `secret` under a fresh nonce and replaces the stored record.
    ///
    /// The previous record stays intact unless the new one is fully written.
    pub fn save(&self, secret: &[u8]) -> VaultResult<()> {
        let _guard = self.lock();
        self.save_locked(secret)
    }

    fn save_locked(&self, secret: &[u8]) -> VaultResult<()> {
        self.ensure_key()?;
        let key = self
            .keystore
            .get_key(&self.config.key_name)
            .map_err(key_err)?;

        let nonce = generate_nonce();
        let ciphertext = key
            .encrypt(&nonce, secret)
            .map_err(|e| VaultError::KeyProvisioning(format!("seal failed: {e}")))?;

        let record = EncryptedRecord { nonce, ciphertext };
        write_atomic(&self.config.record_path, &record.to_bytes())?;
        debug!("credential record written to {}", self.config.record_path.display());
        Ok(())
    }

    /// Reads and opens the stored record. `None` when nothing is stored.
    pub fn load(&self) -> VaultResult<Option<Credential>> {
        let _guard = self.lock();

        let path = &self.config.record_path;
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("read", path, e)),
        };

        let record = EncryptedRecord::from_bytes(&bytes)?;

        let key = match self.keystore.get_key(&self.config.key_name) {
            Ok(k) => k,
            // A record without its key can never be opened again.
            Err(CryptoError::KeyNotFound(name)) => {
                warn!("credential record exists but vault key {name} is missing");
                return Err(VaultError::CredentialCorrupted(format!(
                    "vault key {name} no longer exists"
                )));
            }
            Err(e) => return Err(key_err(e)),
        };

        match key.decrypt(&record.nonce, &record.ciphertext) {
            Ok(plaintext) => Ok(Some(Credential::new(plaintext))),
            Err(CryptoError::Decryption(reason)) => {
                warn!("credential record failed authentication");
                Err(VaultError::CredentialCorrupted(reason))
            }
            Err(e) => Err(key_err(e)),
        }
    }

    pub fn exists(&self) -> bool {
        let _guard = self.lock();
        self.config.record_path.is_file()
    }

    /// Removes the stored record. Removing a missing record is not an error.
    pub fn delete(&self) -> VaultResult<()> {
        let _guard = self.lock();
        match fs::remove_file(&self.config.record_path) {
            Ok(()) => {
                info!("credential record deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("delete", &self.config.record_path, e)),
        }
    }

    /// First-run setup: seals the packaged credential document at `source`
    /// unless a record already exists. Returns whether a record was written.
    pub fn provision_from_file(&self, source: impl AsRef<Path>) -> VaultResult<bool> {
        let _guard = self.lock();
        if self.config.record_path.is_file() {
            debug!("credentials already provisioned");
            return Ok(false);
        }

        let source = source.as_ref();
        let document = zeroize::Zeroizing::new(
            fs::read(source).map_err(|e| io_err("read credential source", source, e))?,
        );
        self.save_locked(&document)?;
        info!("credentials provisioned from {}", source.display());
        Ok(true)
    }
}

/// Owner read/write only.
#[cfg(unix)]
const RECORD_MODE: u32 = 0o600;

/// Writes `bytes` next to `path` and renames over it once fully synced.
fn write_atomic(path: &Path, bytes: &[u8]) -> VaultResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| io_err("create", dir, e))?;

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(RECORD_MODE));
    }
    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| io_err("create temp in", dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_err("write", tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_err("sync", tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_err("replace", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.dat");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temp files left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/record.dat");
        write_atomic(&path, b"x").unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn key_provisioning_is_not_recoverable() {
        assert!(!VaultError::KeyProvisioning("x".into()).is_recoverable());
        assert!(VaultError::CredentialCorrupted("x".into()).is_recoverable());
    }
}
