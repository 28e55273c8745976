//! Shared types for folder mirroring.

use crate::error::CloudError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Drive MIME type for folders. Sub-folders are never mirrored.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Remote file identity and freshness marker, as returned by one listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: String,
    pub name: String,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            modified_at,
            mime_type: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

/// One local directory mirrored from one remote folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMapping {
    pub local_dir: PathBuf,
    pub remote_folder_id: String,
    /// Human-readable name used in outcomes and logs.
    pub label: String,
}

impl FolderMapping {
    pub fn new(
        local_dir: impl Into<PathBuf>,
        remote_folder_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            local_dir: local_dir.into(),
            remote_folder_id: remote_folder_id.into(),
            label: label.into(),
        }
    }
}

/// Per-folder result class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every file that needed fetching was fetched.
    Success,
    /// Some downloads failed; the rest of the folder was still mirrored.
    PartialFailure,
    /// Nothing was attempted: the folder could not be listed or created.
    Failure,
}

/// A single file that could not be mirrored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub name: String,
    pub reason: String,
}

/// What happened to one folder during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub folder: String,
    pub status: SyncStatus,
    pub detail: String,
    pub files_updated: usize,
    #[serde(default)]
    pub files_skipped: usize,
    #[serde(default)]
    pub files_failed: Vec<FileFailure>,
}

impl SyncOutcome {
    /// Folder-level failure: nothing was downloaded.
    pub fn failure(folder: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            status: SyncStatus::Failure,
            detail: detail.into(),
            files_updated: 0,
            files_skipped: 0,
            files_failed: Vec::new(),
        }
    }

    /// Aggregates per-file results. Any failed file makes the folder partial.
    pub fn from_files(
        folder: impl Into<String>,
        files_updated: usize,
        files_skipped: usize,
        files_failed: Vec<FileFailure>,
    ) -> Self {
        let (status, detail) = if files_failed.is_empty() {
            (
                SyncStatus::Success,
                format!("{files_updated} updated, {files_skipped} up to date"),
            )
        } else {
            (
                SyncStatus::PartialFailure,
                format!(
                    "{files_updated} updated, {files_skipped} up to date, {} failed",
                    files_failed.len()
                ),
            )
        };
        Self {
            folder: folder.into(),
            status,
            detail,
            files_updated,
            files_skipped,
            files_failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

/// Progress notifications emitted by the coordinator during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SyncEvent {
    RunStarted {
        folders: usize,
    },
    FolderCompleted(SyncOutcome),
    RunFinished {
        succeeded: usize,
        partial: usize,
        failed: usize,
    },
    /// The run stopped before any folder work (no credential, auth failure).
    /// `kind` is the stable error class from [`CloudError::kind`].
    RunFailed {
        kind: String,
        error: String,
    },
}

impl SyncEvent {
    /// Summary event for a finished set of outcomes.
    pub fn finished(outcomes: &[SyncOutcome]) -> Self {
        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        SyncEvent::RunFinished {
            succeeded: count(SyncStatus::Success),
            partial: count(SyncStatus::PartialFailure),
            failed: count(SyncStatus::Failure),
        }
    }

    pub fn failed(error: &CloudError) -> Self {
        SyncEvent::RunFailed {
            kind: error.kind().to_string(),
            error: error.to_string(),
        }
    }
}
