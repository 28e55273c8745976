//! One-way folder mirroring.
//!
//! For one folder mapping: list the remote folder, compare each file's remote
//! modification time with the local file's mtime, and download what is
//! missing or older. Local file presence and mtime are the only sync state.
//!
//! Each download is staged in a hidden `.part` file next to its destination
//! and renamed into place only after the last byte is written and the mtime
//! is set. A dropped or failed download removes its staging file.

use crate::error::{CloudError, CloudResult};
use crate::remote::RemoteSession;
use crate::types::{FileFailure, FileMeta, FolderMapping, SyncOutcome};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

fn local_err(context: &str, path: &Path, e: std::io::Error) -> CloudError {
    CloudError::LocalStorage(format!("{context} {}: {e}", path.display()))
}

/// Mirrors remote folders into local directories.
#[derive(Clone, Debug)]
pub struct SyncEngine {
    max_concurrent_downloads: usize,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(4)
    }
}

impl SyncEngine {
    /// `max_concurrent_downloads` caps parallel downloads within one folder.
    pub fn new(max_concurrent_downloads: usize) -> Self {
        Self {
            max_concurrent_downloads: max_concurrent_downloads.max(1),
        }
    }

    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_concurrent_downloads
    }

    /// Mirrors one folder. Never fails as a whole: every error ends up in
    /// the returned outcome.
    pub async fn mirror(&self, folder: &FolderMapping, remote: &dyn RemoteSession) -> SyncOutcome {
        let label = folder.label.as_str();

        if let Err(e) = tokio::fs::create_dir_all(&folder.local_dir).await {
            let err = local_err("create", &folder.local_dir, e);
            warn!("[{label}] {err}");
            return SyncOutcome::failure(label, err.to_string());
        }

        let listing = match remote.list_folder(&folder.remote_folder_id).await {
            Ok(files) => files,
            Err(e) => {
                warn!("[{label}] listing failed: {e}");
                return SyncOutcome::failure(label, e.to_string());
            }
        };

        let mut failed = Vec::new();
        let mut skipped = 0usize;
        let mut stale = Vec::new();

        for meta in newest_by_name(label, listing) {
            let dest = match local_path(&folder.local_dir, &meta.name) {
                Ok(p) => p,
                Err(e) => {
                    warn!("[{label}] skipping remote file {}: {e}", meta.id);
                    failed.push(FileFailure {
                        name: meta.name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match needs_fetch(&dest, meta.modified_at).await {
                Ok(true) => stale.push((meta, dest)),
                Ok(false) => {
                    debug!("[{label}] {} is up to date", meta.name);
                    skipped += 1;
                }
                Err(e) => {
                    warn!("[{label}] {e}");
                    failed.push(FileFailure {
                        name: meta.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let results: Vec<(String, CloudResult<u64>)> = stream::iter(stale)
            .map(|(meta, dest)| async move {
                let result = fetch_file(remote, &meta, &folder.local_dir, &dest).await;
                (meta.name, result)
            })
            .buffer_unordered(self.max_concurrent_downloads)
            .collect()
            .await;

        let mut updated = 0usize;
        for (name, result) in results {
            match result {
                Ok(bytes) => {
                    debug!("[{label}] downloaded {name} ({bytes} bytes)");
                    updated += 1;
                }
                Err(e) => {
                    warn!("[{label}] download of {name} failed: {e}");
                    failed.push(FileFailure {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let outcome = SyncOutcome::from_files(label, updated, skipped, failed);
        info!("[{label}] {}", outcome.detail);
        outcome
    }
}

/// Drive allows several files with one name in a folder; only the most
/// recently modified one can be mirrored.
fn newest_by_name(label: &str, listing: Vec<FileMeta>) -> Vec<FileMeta> {
    let mut by_name: HashMap<String, FileMeta> = HashMap::with_capacity(listing.len());
    for meta in listing {
        match by_name.get(&meta.name) {
            Some(existing) => {
                warn!("[{label}] duplicate remote name {}", meta.name);
                if meta.modified_at > existing.modified_at {
                    by_name.insert(meta.name.clone(), meta);
                }
            }
            None => {
                by_name.insert(meta.name.clone(), meta);
            }
        }
    }
    by_name.into_values().collect()
}

/// `dir/name`, provided `name` is one plain path component.
fn local_path(dir: &Path, name: &str) -> CloudResult<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(dir.join(name)),
        _ => Err(CloudError::LocalStorage(format!("unsafe file name {name:?}"))),
    }
}

/// Missing locally, or the local copy is strictly older than the remote one.
async fn needs_fetch(path: &Path, remote_modified: DateTime<Utc>) -> CloudResult<bool> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(local_err("stat", path, e)),
    };
    let local_modified: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| local_err("read mtime of", path, e))?
        .into();
    Ok(local_modified < remote_modified)
}

/// Downloads `meta` into `dest` via a staging file in `dir`.
async fn fetch_file(
    remote: &dyn RemoteSession,
    meta: &FileMeta,
    dir: &Path,
    dest: &Path,
) -> CloudResult<u64> {
    let staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| local_err("create staging file in", dir, e))?;
    // The TempPath deletes the staging file if we bail out or get dropped.
    let (file, temp_path) = staged.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut body = remote.download_file(&meta.id).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| local_err("write", &temp_path, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| local_err("flush", &temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| local_err("sync", &temp_path, e))?;
    drop(file);

    let mtime = FileTime::from_unix_time(
        meta.modified_at.timestamp(),
        meta.modified_at.timestamp_subsec_nanos(),
    );
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        filetime::set_file_mtime(&temp_path, mtime)
            .map_err(|e| local_err("set mtime of", &temp_path, e))?;
        temp_path
            .persist(&dest)
            .map_err(|e| local_err("move into place", &dest, e.error))
    })
    .await
    .map_err(|e| CloudError::LocalStorage(format!("finalizing download: {e}")))??;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn plain_names_are_accepted() {
        let dir = Path::new("/content/lessons");
        assert_eq!(
            local_path(dir, "intro.pdf").unwrap(),
            PathBuf::from("/content/lessons/intro.pdf")
        );
        assert!(local_path(dir, ".hidden").is_ok());
    }

    #[test]
    fn escaping_names_are_rejected() {
        let dir = Path::new("/content/lessons");
        for name in ["", ".", "..", "../x", "a/b", "a\\b", "/etc/passwd", "a/"] {
            assert!(local_path(dir, name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn duplicates_keep_newest() {
        let older = FileMeta::new("1", "a.txt", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let newer = FileMeta::new("2", "a.txt", Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let other = FileMeta::new("3", "b.txt", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let kept = newest_by_name("t", vec![older, newer.clone(), other]);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&newer));
    }

    #[tokio::test]
    async fn missing_file_needs_fetch() {
        let dir = tempfile::tempdir().unwrap();
        assert!(needs_fetch(&dir.path().join("absent"), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn staleness_compares_mtime_strictly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        let remote = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(remote.timestamp(), 0)).unwrap();
        assert!(!needs_fetch(&path, remote).await.unwrap());

        let later = remote + chrono::Duration::seconds(1);
        assert!(needs_fetch(&path, later).await.unwrap());

        let earlier = remote - chrono::Duration::seconds(1);
        assert!(!needs_fetch(&path, earlier).await.unwrap());
    }
}
