//! Remote folder mirroring for LessonSync.
//!
//! Provides one-way, diff-based sync from a remote store with:
//! - A `RemoteStore` capability and a Drive v3 implementation
//! - Service-account authentication with token refresh on 401
//! - Per-folder mirroring with bounded parallel downloads
//! - A coordinator that runs every folder and reports progress events

pub mod config;
pub mod coordinator;
pub mod drive_client;
pub mod error;
pub mod remote;
pub mod service_account;
pub mod sync_engine;
pub mod types;

pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use drive_client::DriveStore;
pub use error::{CloudError, CloudResult};
pub use remote::{ByteStream, RemoteSession, RemoteStore};
pub use sync_engine::SyncEngine;
pub use types::*;
