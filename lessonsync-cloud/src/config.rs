//! Sync configuration.

use crate::error::{CloudError, CloudResult};
use crate::types::FolderMapping;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Configuration for the remote store and the sync engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL for the Drive API (e.g., "https://www.googleapis.com").
    pub api_base_url: String,

    /// OAuth scope requested in the service-account assertion.
    pub oauth_scope: String,

    /// Folder fetched right after authentication as a connection test.
    pub probe_folder_id: Option<String>,

    /// Upper bound on simultaneous downloads within one folder.
    pub max_concurrent_downloads: usize,

    /// Timeout for token, metadata, and listing requests (seconds).
    /// Downloads are only bounded by the connect timeout.
    pub request_timeout_secs: u64,

    /// Folders mirrored by every run.
    pub folders: Vec<FolderMapping>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            oauth_scope: "https://www.googleapis.com/auth/drive.file".to_string(),
            probe_folder_id: None,
            max_concurrent_downloads: 4,
            request_timeout_secs: 30,
            folders: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Rejects mappings that would make outcomes ambiguous or let two
    /// folders write into the same directory.
    pub fn validate(&self) -> CloudResult<()> {
        let mut labels = HashSet::new();
        let mut dirs = HashSet::new();
        for folder in &self.folders {
            if folder.label.trim().is_empty() {
                return Err(CloudError::Config("folder label is empty".into()));
            }
            if folder.remote_folder_id.trim().is_empty() {
                return Err(CloudError::Config(format!(
                    "folder {} has an empty remote folder id",
                    folder.label
                )));
            }
            if !labels.insert(folder.label.as_str()) {
                return Err(CloudError::Config(format!(
                    "duplicate folder label {}",
                    folder.label
                )));
            }
            if !dirs.insert(folder.local_dir.as_path()) {
                return Err(CloudError::Config(format!(
                    "local directory {} is mapped twice",
                    folder.local_dir.display()
                )));
            }
        }
        Ok(())
    }

    /// The folder list with relative local directories resolved against `root`.
    pub fn resolved_folders(&self, root: &Path) -> Vec<FolderMapping> {
        self.folders
            .iter()
            .map(|f| FolderMapping {
                local_dir: root.join(&f.local_dir),
                ..f.clone()
            })
            .collect()
    }

    pub fn download_concurrency(&self) -> usize {
        self.max_concurrent_downloads.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn relative_dirs_resolve_against_root() {
        let config = SyncConfig {
            folders: vec![
                FolderMapping::new("lessons", "id-1", "lessons"),
                FolderMapping::new("/abs/videos", "id-2", "videos"),
            ],
            ..Default::default()
        };
        let resolved = config.resolved_folders(Path::new("/data/JustLearnIt"));
        assert_eq!(resolved[0].local_dir, PathBuf::from("/data/JustLearnIt/lessons"));
        assert_eq!(resolved[1].local_dir, PathBuf::from("/abs/videos"));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let config = SyncConfig {
            max_concurrent_downloads: 0,
            ..Default::default()
        };
        assert_eq!(config.download_concurrency(), 1);
    }
}
