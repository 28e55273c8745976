//! Sync error types.

use lessonsync_vault::VaultError;
use thiserror::Error;

/// Result type for sync operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur while mirroring remote folders.
///
/// File- and folder-scoped variants are folded into [`SyncOutcome`](crate::SyncOutcome)s
/// by the engine; only run-level variants reach the caller as `Err`.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Nothing has been provisioned yet. Expected on first run.
    #[error("no credential stored")]
    NoCredential,

    #[error("key provisioning failed: {0}")]
    KeyProvisioning(String),

    #[error("stored credential is corrupted: {0}")]
    CredentialCorrupted(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("listing folder {folder_id} failed: {reason}")]
    RemoteList { folder_id: String, reason: String },

    #[error("downloading file {file_id} failed: {reason}")]
    RemoteFetch { file_id: String, reason: String },

    #[error("local storage error: {0}")]
    LocalStorage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloudError {
    /// Whether a later run (or re-provisioning) can succeed without platform changes.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CloudError::KeyProvisioning(_) | CloudError::Config(_))
    }

    /// Stable short name for the error class, reported in `RunFailed` events.
    pub fn kind(&self) -> &'static str {
        match self {
            CloudError::NoCredential => "no_credential",
            CloudError::KeyProvisioning(_) => "key_provisioning",
            CloudError::CredentialCorrupted(_) => "credential_corrupted",
            CloudError::AuthFailed(_) => "authentication",
            CloudError::RemoteList { .. } => "remote_list",
            CloudError::RemoteFetch { .. } => "remote_fetch",
            CloudError::LocalStorage(_) => "local_storage",
            CloudError::Serialization(_) => "serialization",
            CloudError::Http(_) => "http",
            CloudError::Config(_) => "config",
        }
    }
}

impl From<VaultError> for CloudError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::KeyProvisioning(msg) => CloudError::KeyProvisioning(msg),
            VaultError::CredentialCorrupted(msg) => CloudError::CredentialCorrupted(msg),
            VaultError::Storage(msg) => CloudError::LocalStorage(msg),
        }
    }
}
