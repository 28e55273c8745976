//! Remote store capability consumed by the sync engine.

use crate::error::CloudResult;
use crate::types::FileMeta;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use lessonsync_vault::Credential;
use std::sync::Arc;

/// File contents as a stream of chunks.
pub type ByteStream = BoxStream<'static, CloudResult<Bytes>>;

/// Turns a decrypted credential into an authenticated session.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fails with `CloudError::AuthFailed` when the credential is rejected
    /// or the endpoint is unreachable.
    async fn authenticate(&self, credential: &Credential) -> CloudResult<Arc<dyn RemoteSession>>;
}

/// An authenticated handle, shared read-only across folder mirrors.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Lists the files directly inside `folder_id`.
    async fn list_folder(&self, folder_id: &str) -> CloudResult<Vec<FileMeta>>;

    /// Opens a download of `file_id`. Errors while streaming surface as
    /// items of the stream.
    async fn download_file(&self, file_id: &str) -> CloudResult<ByteStream>;

    /// Whether folders may be mirrored in parallel over this session.
    fn supports_concurrent_requests(&self) -> bool {
        true
    }
}
