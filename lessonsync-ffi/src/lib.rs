//! C ABI exports for the LessonSync service.
//!
//! This crate exposes the vault and folder sync as a C-compatible library for:
//! - Android (JNI, see `android_jni`)
//! - iOS (Swift C interop)
//!
//! One long-lived service instance lives in process-wide state between
//! `lessonsync_init` and `lessonsync_shutdown`. All functions use
//! C-compatible types and report errors via return codes; structured
//! results are returned as JSON strings freed with `lessonsync_free_string`.

#[cfg(target_os = "android")]
mod android_jni;
mod config;

pub use config::{KeyStoreKind, ServiceConfig};

use lessonsync_cloud::{
    CloudError, DriveStore, FolderMapping, SyncCoordinator, SyncEngine, SyncEvent,
};
use lessonsync_vault::{CredentialVault, VaultError};
use serde::Serialize;
use std::ffi::{c_char, CStr, CString};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Pending events beyond this are dropped until the host polls.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Error codes returned by FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonSyncError {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer argument.
    NullPointer = 1,
    /// Invalid UTF-8 string.
    InvalidUtf8 = 2,
    /// JSON serialization error.
    JsonError = 3,
    /// Service not initialized.
    NotInitialized = 4,
    /// Configuration rejected.
    InvalidConfig = 5,
    /// Platform key facility unavailable.
    KeyProvisioning = 6,
    /// Stored credential unreadable; re-provision.
    CredentialCorrupted = 7,
    /// No credential provisioned yet.
    NoCredential = 8,
    /// Remote rejected the credential.
    AuthError = 9,
    /// Remote listing or download failed.
    RemoteError = 10,
    /// Local filesystem error.
    StorageError = 11,
    /// A background sync run is already in progress.
    SyncAlreadyRunning = 12,
    /// No background sync run in progress.
    SyncNotRunning = 13,
    /// The run was cancelled or the service shut down before it finished.
    SyncCancelled = 14,
    /// Unknown error.
    Unknown = 99,
}

impl From<&CloudError> for LessonSyncError {
    fn from(e: &CloudError) -> Self {
        match e {
            CloudError::NoCredential => LessonSyncError::NoCredential,
            CloudError::KeyProvisioning(_) => LessonSyncError::KeyProvisioning,
            CloudError::CredentialCorrupted(_) => LessonSyncError::CredentialCorrupted,
            CloudError::AuthFailed(_) => LessonSyncError::AuthError,
            CloudError::RemoteList { .. } | CloudError::RemoteFetch { .. } | CloudError::Http(_) => {
                LessonSyncError::RemoteError
            }
            CloudError::LocalStorage(_) => LessonSyncError::StorageError,
            CloudError::Serialization(_) => LessonSyncError::JsonError,
            CloudError::Config(_) => LessonSyncError::InvalidConfig,
        }
    }
}

impl From<&VaultError> for LessonSyncError {
    fn from(e: &VaultError) -> Self {
        match e {
            VaultError::KeyProvisioning(_) => LessonSyncError::KeyProvisioning,
            VaultError::CredentialCorrupted(_) => LessonSyncError::CredentialCorrupted,
            VaultError::Storage(_) => LessonSyncError::StorageError,
        }
    }
}

/// Opaque handle to the LessonSync service.
pub struct LessonSyncHandle {
    runtime: Runtime,
    vault: Arc<CredentialVault>,
    coordinator: Arc<SyncCoordinator>,
    folders: Arc<Vec<FolderMapping>>,
    event_rx: mpsc::Receiver<SyncEvent>,
    active_run: Option<JoinHandle<()>>,
}

impl LessonSyncHandle {
    fn run_in_progress(&self) -> bool {
        self.active_run.as_ref().is_some_and(|run| !run.is_finished())
    }

    /// Aborts any in-flight run and stops the runtime without waiting on it.
    fn shutdown(self) {
        if let Some(run) = self.active_run {
            run.abort();
        }
        self.runtime.shutdown_background();
    }
}

/// Global handle storage (single instance).
static HANDLE: Mutex<Option<LessonSyncHandle>> = Mutex::new(None);

/// Acquire the HANDLE lock, recovering from poison.
pub(crate) fn lock_handle() -> MutexGuard<'static, Option<LessonSyncHandle>> {
    HANDLE.lock().unwrap_or_else(|poisoned| {
        warn!("recovering from poisoned service handle");
        poisoned.into_inner()
    })
}

/// Reads a required C string argument.
unsafe fn read_str<'a>(ptr: *const c_char) -> Result<&'a str, LessonSyncError> {
    if ptr.is_null() {
        return Err(LessonSyncError::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| LessonSyncError::InvalidUtf8)
}

/// Serializes `value` into a newly allocated C string at `out_json`.
unsafe fn write_json<T: Serialize>(out_json: *mut *mut c_char, value: &T) -> LessonSyncError {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(_) => return LessonSyncError::JsonError,
    };
    match CString::new(json) {
        Ok(c_json) => {
            unsafe { *out_json = c_json.into_raw() };
            LessonSyncError::Ok
        }
        Err(_) => LessonSyncError::JsonError,
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// Initializes the service from a JSON `ServiceConfig`. Replaces any
/// previously initialized instance.
///
/// # Safety
/// - `config_json` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_init(config_json: *const c_char) -> LessonSyncError {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let json = match unsafe { read_str(config_json) } {
        Ok(s) => s,
        Err(e) => return e,
    };
    let config: ServiceConfig = match serde_json::from_str(json) {
        Ok(c) => c,
        Err(e) => {
            warn!("invalid service config: {e}");
            return LessonSyncError::JsonError;
        }
    };

    match build_handle(config) {
        Ok(handle) => {
            let previous = lock_handle().replace(handle);
            if let Some(previous) = previous {
                info!("replacing running service instance");
                previous.shutdown();
            }
            LessonSyncError::Ok
        }
        Err(code) => code,
    }
}

fn build_handle(config: ServiceConfig) -> Result<LessonSyncHandle, LessonSyncError> {
    if let Err(e) = config.sync.validate() {
        warn!("{e}");
        return Err(LessonSyncError::InvalidConfig);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lessonsync")
        .build()
        .map_err(|e| {
            warn!("failed to start runtime: {e}");
            LessonSyncError::Unknown
        })?;

    let vault = Arc::new(CredentialVault::new(
        config.vault_config(),
        config.build_keystore(),
    ));
    vault.ensure_key().map_err(|e| {
        warn!("{e}");
        LessonSyncError::from(&e)
    })?;

    if let Some(source) = &config.provision_path {
        match vault.provision_from_file(source) {
            Ok(true) => info!("first-run credentials provisioned"),
            Ok(false) => {}
            // A missing packaged document is not fatal; sync reports NoCredential.
            Err(e) => warn!("credential provisioning skipped: {e}"),
        }
    }

    let remote = DriveStore::new(config.sync.clone()).map_err(|e| {
        warn!("{e}");
        LessonSyncError::from(&e)
    })?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let coordinator = SyncCoordinator::new(
        vault.clone(),
        Arc::new(remote),
        SyncEngine::new(config.sync.download_concurrency()),
    )
    .with_events(event_tx);

    let folders = config.sync.resolved_folders(&config.content_root());
    info!(
        "service initialized with {} folders, credential record at {}",
        folders.len(),
        vault.record_path().display()
    );

    Ok(LessonSyncHandle {
        runtime,
        vault,
        coordinator: Arc::new(coordinator),
        folders: Arc::new(folders),
        event_rx,
        active_run: None,
    })
}

/// Shuts down the service, cancelling any in-flight sync run.
#[unsafe(no_mangle)]
pub extern "C" fn lessonsync_shutdown() {
    let handle = lock_handle().take();
    if let Some(handle) = handle {
        handle.shutdown();
        info!("service shut down");
    }
}

/// Returns the library version as a string.
///
/// # Safety
/// - The returned string is statically allocated and must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn lessonsync_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Frees a string allocated by this library.
///
/// # Safety
/// - `s` must be a string allocated by this library, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

// ============================================================================
// Credential Functions
// ============================================================================

/// Seals the credential document at `path` unless one is already stored.
///
/// # Safety
/// - `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_provision_credentials(path: *const c_char) -> LessonSyncError {
    let path = match unsafe { read_str(path) } {
        Ok(s) => s,
        Err(e) => return e,
    };

    let vault = match lock_handle().as_ref() {
        Some(h) => h.vault.clone(),
        None => return LessonSyncError::NotInitialized,
    };

    match vault.provision_from_file(path) {
        Ok(_) => LessonSyncError::Ok,
        Err(e) => {
            warn!("{e}");
            LessonSyncError::from(&e)
        }
    }
}

/// Writes whether a credential record is stored.
///
/// # Safety
/// - `out_exists` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_has_credentials(out_exists: *mut bool) -> LessonSyncError {
    if out_exists.is_null() {
        return LessonSyncError::NullPointer;
    }
    let handle = lock_handle();
    match handle.as_ref() {
        Some(h) => {
            unsafe { *out_exists = h.vault.exists() };
            LessonSyncError::Ok
        }
        None => LessonSyncError::NotInitialized,
    }
}

/// Removes the stored credential record. Succeeds if none is stored.
#[unsafe(no_mangle)]
pub extern "C" fn lessonsync_delete_credentials() -> LessonSyncError {
    let vault = match lock_handle().as_ref() {
        Some(h) => h.vault.clone(),
        None => return LessonSyncError::NotInitialized,
    };
    match vault.delete() {
        Ok(()) => LessonSyncError::Ok,
        Err(e) => LessonSyncError::from(&e),
    }
}

// ============================================================================
// Sync Functions
// ============================================================================

/// Runs a full sync and blocks until it finishes.
///
/// On success `out_json` receives a JSON array of per-folder outcomes.
/// Run-level failures (no credential, authentication) return their error
/// code and leave `out_json` null.
///
/// # Safety
/// - `out_json` must be a valid pointer.
/// - The returned string must be freed with `lessonsync_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_sync_all(out_json: *mut *mut c_char) -> LessonSyncError {
    if out_json.is_null() {
        return LessonSyncError::NullPointer;
    }
    unsafe { *out_json = std::ptr::null_mut() };

    // Don't hold the global lock for the whole run.
    // The run is registered as the active run so that start, cancel and
    // is_running see it, but the global lock is released while it runs.
    let (rt, result_rx) = {
        let mut handle = lock_handle();
        let handle = match handle.as_mut() {
            Some(h) => h,
            None => return LessonSyncError::NotInitialized,
        };
        if handle.run_in_progress() {
            return LessonSyncError::SyncAlreadyRunning;
        }
        let coordinator = handle.coordinator.clone();
        let folders = handle.folders.clone();
        let (result_tx, result_rx) = oneshot::channel();
        handle.active_run = Some(handle.runtime.spawn(async move {
            let _ = result_tx.send(coordinator.run_all(&folders).await);
        }));
        (handle.runtime.handle().clone(), result_rx)
    };

    match rt.block_on(result_rx) {
        Ok(Ok(outcomes)) => unsafe { write_json(out_json, &outcomes) },
        Ok(Err(e)) => LessonSyncError::from(&e),
        // The task was dropped before reporting: cancelled or shut down.
        Err(_) => {
            info!("blocking sync run cancelled");
            LessonSyncError::SyncCancelled
        }
    }
}

/// Starts a sync run in the background. Progress and the final result are
/// reported through `lessonsync_poll_events`.
#[unsafe(no_mangle)]
pub extern "C" fn lessonsync_sync_start() -> LessonSyncError {
    let mut handle = lock_handle();
    let handle = match handle.as_mut() {
        Some(h) => h,
        None => return LessonSyncError::NotInitialized,
    };
    if handle.run_in_progress() {
        return LessonSyncError::SyncAlreadyRunning;
    }

    let coordinator = handle.coordinator.clone();
    let folders = handle.folders.clone();
    handle.active_run = Some(handle.runtime.spawn(async move {
        // Failures are already reported as RunFailed events.
        let _ = coordinator.run_all(&folders).await;
    }));
    info!("background sync started");
    LessonSyncError::Ok
}

/// Cancels the in-flight sync run, whether started by `lessonsync_sync_start`
/// or `lessonsync_sync_all`. Files being downloaded are discarded; files
/// already mirrored stay in place. A cancelled `lessonsync_sync_all` returns
/// `SyncCancelled`.
#[unsafe(no_mangle)]
pub extern "C" fn lessonsync_sync_cancel() -> LessonSyncError {
    let mut handle = lock_handle();
    let handle = match handle.as_mut() {
        Some(h) => h,
        None => return LessonSyncError::NotInitialized,
    };
    match handle.active_run.take() {
        Some(run) if !run.is_finished() => {
            run.abort();
            info!("sync run cancelled");
            LessonSyncError::Ok
        }
        _ => LessonSyncError::SyncNotRunning,
    }
}

/// Writes whether a sync run (background or blocking) is in progress.
///
/// # Safety
/// - `out_running` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_sync_is_running(out_running: *mut bool) -> LessonSyncError {
    if out_running.is_null() {
        return LessonSyncError::NullPointer;
    }
    let handle = lock_handle();
    match handle.as_ref() {
        Some(h) => {
            unsafe { *out_running = h.run_in_progress() };
            LessonSyncError::Ok
        }
        None => LessonSyncError::NotInitialized,
    }
}

/// Drains pending sync events into a JSON array (possibly empty).
///
/// # Safety
/// - `out_json` must be a valid pointer.
/// - The returned string must be freed with `lessonsync_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lessonsync_poll_events(out_json: *mut *mut c_char) -> LessonSyncError {
    if out_json.is_null() {
        return LessonSyncError::NullPointer;
    }
    unsafe { *out_json = std::ptr::null_mut() };

    let mut handle = lock_handle();
    let handle = match handle.as_mut() {
        Some(h) => h,
        None => return LessonSyncError::NotInitialized,
    };

    let mut events = Vec::new();
    while let Ok(event) = handle.event_rx.try_recv() {
        events.push(event);
    }
    unsafe { write_json(out_json, &events) }
}
