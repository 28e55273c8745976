//! Service configuration passed to `lessonsync_init` as JSON.

use lessonsync_cloud::SyncConfig;
use lessonsync_crypto::os::DEFAULT_SERVICE;
use lessonsync_crypto::{KeyStore, MemoryKeyStore, OsKeyStore};
use lessonsync_vault::VaultConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which key store backs the credential vault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreKind {
    /// The platform credential store.
    #[default]
    Os,
    /// Process memory only. Credentials do not survive a restart.
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the sealed credential record.
    pub data_dir: PathBuf,
    /// Relative folder paths resolve against this. Defaults to `data_dir`.
    #[serde(default)]
    pub content_root: Option<PathBuf>,
    #[serde(default)]
    pub keystore: KeyStoreKind,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Packaged credential document sealed on first run.
    #[serde(default)]
    pub provision_path: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn content_root(&self) -> PathBuf {
        self.content_root
            .clone()
            .unwrap_or_else(|| self.data_dir.clone())
    }

    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig::in_dir(&self.data_dir)
    }

    pub fn build_keystore(&self) -> Arc<dyn KeyStore> {
        match self.keystore {
            KeyStoreKind::Os => Arc::new(OsKeyStore::new(DEFAULT_SERVICE)),
            KeyStoreKind::Memory => Arc::new(MemoryKeyStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses() {
        let config: ServiceConfig = serde_json::from_str(r#"{"data_dir": "/data"}"#).unwrap();
        assert_eq!(config.keystore, KeyStoreKind::Os);
        assert_eq!(config.content_root(), PathBuf::from("/data"));
        assert!(config.sync.folders.is_empty());
        assert_eq!(
            config.vault_config().record_path,
            PathBuf::from("/data/encrypted_credentials.dat")
        );
    }

    #[test]
    fn full_config_parses() {
        let json = r#"{
            "data_dir": "/data",
            "content_root": "/sdcard/JustLearnIt",
            "keystore": "memory",
            "provision_path": "/assets/credentials/drive_credentials.json",
            "sync": {
                "max_concurrent_downloads": 2,
                "folders": [
                    {"local_dir": "videos", "remote_folder_id": "1vid", "label": "videos"}
                ]
            }
        }"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.keystore, KeyStoreKind::Memory);
        assert_eq!(config.content_root(), PathBuf::from("/sdcard/JustLearnIt"));
        assert_eq!(config.sync.max_concurrent_downloads, 2);
        assert_eq!(config.sync.folders[0].label, "videos");
    }
}
