//! Shared test helpers: a scriptable in-memory remote store and vault setup.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use lessonsync_cloud::{
    ByteStream, CloudError, CloudResult, FileMeta, FolderMapping, RemoteSession, RemoteStore,
};
use lessonsync_crypto::MemoryKeyStore;
use lessonsync_vault::{Credential, CredentialVault, VaultConfig};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const CREDENTIAL: &str = r#"{"type":"service_account","client_email":"mirror@test"}"#;

/// A fixed point in the past, `days` after 2024-01-01.
pub fn day(days: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap() + chrono::Duration::days(days)
}

pub fn mtime(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path).unwrap().modified().unwrap().into()
}

pub fn set_mtime(path: &Path, when: DateTime<Utc>) {
    let ft = filetime::FileTime::from_system_time(SystemTime::from(when));
    filetime::set_file_mtime(path, ft).unwrap();
}

/// Leftover staging files in `dir`.
pub fn staging_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".part"))
        .collect()
}

// ── Fake remote ──

#[derive(Default)]
pub struct FakeState {
    listings: Mutex<HashMap<String, Vec<FileMeta>>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    failing_lists: Mutex<HashSet<String>>,
    failing_downloads: Mutex<HashSet<String>>,
    broken_streams: Mutex<HashSet<String>>,
    stalled_downloads: Mutex<HashSet<String>>,
    reject_auth: AtomicBool,
    sequential: AtomicBool,
    download_delay_ms: AtomicU64,
    last_credential: Mutex<Option<Vec<u8>>>,

    pub auth_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// Scriptable in-memory remote store. Clones share state.
#[derive(Clone, Default)]
pub struct FakeRemote(pub Arc<FakeState>);

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file in `folder_id`.
    pub fn put_file(&self, folder_id: &str, id: &str, name: &str, modified: DateTime<Utc>, body: &[u8]) {
        let mut listings = self.0.listings.lock().unwrap();
        let files = listings.entry(folder_id.to_string()).or_default();
        files.retain(|f| f.id != id);
        files.push(FileMeta::new(id, name, modified));
        self.0.contents.lock().unwrap().insert(id.to_string(), body.to_vec());
    }

    /// Registers a folder with no files.
    pub fn empty_folder(&self, folder_id: &str) {
        self.0.listings.lock().unwrap().entry(folder_id.to_string()).or_default();
    }

    pub fn fail_listing(&self, folder_id: &str) {
        self.0.failing_lists.lock().unwrap().insert(folder_id.to_string());
    }

    pub fn fail_download(&self, file_id: &str) {
        self.0.failing_downloads.lock().unwrap().insert(file_id.to_string());
    }

    /// The download starts but errors after the first chunk.
    pub fn break_stream(&self, file_id: &str) {
        self.0.broken_streams.lock().unwrap().insert(file_id.to_string());
    }

    /// The download sends one chunk and then never completes.
    pub fn stall_download(&self, file_id: &str) {
        self.0.stalled_downloads.lock().unwrap().insert(file_id.to_string());
    }

    pub fn reject_auth(&self) {
        self.0.reject_auth.store(true, Ordering::SeqCst);
    }

    pub fn sequential_only(&self) {
        self.0.sequential.store(true, Ordering::SeqCst);
    }

    pub fn download_delay(&self, delay: Duration) {
        self.0
            .download_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn last_credential(&self) -> Option<Vec<u8>> {
        self.0.last_credential.lock().unwrap().clone()
    }

    pub fn auth_calls(&self) -> usize {
        self.0.auth_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.0.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.0.download_calls.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.auth_calls() + self.list_calls() + self.download_calls()
    }

    pub fn max_in_flight(&self) -> usize {
        self.0.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn authenticate(&self, credential: &Credential) -> CloudResult<Arc<dyn RemoteSession>> {
        self.0.auth_calls.fetch_add(1, Ordering::SeqCst);
        *self.0.last_credential.lock().unwrap() = Some(credential.as_bytes().to_vec());
        if self.0.reject_auth.load(Ordering::SeqCst) {
            return Err(CloudError::AuthFailed("credential rejected".into()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl RemoteSession for FakeRemote {
    async fn list_folder(&self, folder_id: &str) -> CloudResult<Vec<FileMeta>> {
        self.0.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.failing_lists.lock().unwrap().contains(folder_id) {
            return Err(CloudError::RemoteList {
                folder_id: folder_id.to_string(),
                reason: "folder not found or not accessible".into(),
            });
        }
        self.0
            .listings
            .lock()
            .unwrap()
            .get(folder_id)
            .cloned()
            .ok_or_else(|| CloudError::RemoteList {
                folder_id: folder_id.to_string(),
                reason: "unknown folder".into(),
            })
    }

    async fn download_file(&self, file_id: &str) -> CloudResult<ByteStream> {
        self.0.download_calls.fetch_add(1, Ordering::SeqCst);

        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.0.download_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fetch_err = |reason: &str| CloudError::RemoteFetch {
            file_id: file_id.to_string(),
            reason: reason.to_string(),
        };
        if self.0.failing_downloads.lock().unwrap().contains(file_id) {
            return Err(fetch_err("500 Internal Server Error"));
        }
        let body = self
            .0
            .contents
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| fetch_err("404 Not Found"))?;

        let half = body.len() / 2;
        let first = Bytes::copy_from_slice(&body[..half]);
        let second = Bytes::copy_from_slice(&body[half..]);

        if self.0.broken_streams.lock().unwrap().contains(file_id) {
            let chunks = vec![Ok(first), Err(fetch_err("connection reset"))];
            return Ok(futures::stream::iter(chunks).boxed());
        }
        if self.0.stalled_downloads.lock().unwrap().contains(file_id) {
            return Ok(futures::stream::iter(vec![Ok(first)])
                .chain(futures::stream::pending())
                .boxed());
        }
        Ok(futures::stream::iter(vec![Ok(first), Ok(second)]).boxed())
    }

    fn supports_concurrent_requests(&self) -> bool {
        !self.0.sequential.load(Ordering::SeqCst)
    }
}

// ── Vault ──

pub fn vault_in(dir: &TempDir) -> Arc<CredentialVault> {
    Arc::new(CredentialVault::new(
        VaultConfig::in_dir(dir.path().join("vault")),
        Arc::new(MemoryKeyStore::new()),
    ))
}

pub fn provisioned_vault(dir: &TempDir) -> Arc<CredentialVault> {
    let vault = vault_in(dir);
    vault.save(CREDENTIAL.as_bytes()).unwrap();
    vault
}

pub fn mapping(dir: &TempDir, name: &str) -> FolderMapping {
    FolderMapping::new(dir.path().join("content").join(name), format!("id-{name}"), name)
}
