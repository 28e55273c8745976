//! Run orchestration: vault → remote session → one mirror per folder.

use crate::error::{CloudError, CloudResult};
use crate::remote::{RemoteSession, RemoteStore};
use crate::sync_engine::SyncEngine;
use crate::types::{FolderMapping, SyncEvent, SyncOutcome};
use futures::future::join_all;
use lessonsync_vault::{Credential, CredentialVault};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drives a full sync run across all configured folders.
pub struct SyncCoordinator {
    vault: Arc<CredentialVault>,
    remote: Arc<dyn RemoteStore>,
    engine: SyncEngine,
    events: Option<mpsc::Sender<SyncEvent>>,
}

impl SyncCoordinator {
    pub fn new(vault: Arc<CredentialVault>, remote: Arc<dyn RemoteStore>, engine: SyncEngine) -> Self {
        Self {
            vault,
            remote,
            engine,
            events: None,
        }
    }

    /// Reports progress on `tx`. Events are dropped rather than waited on
    /// when the receiver falls behind.
    pub fn with_events(mut self, tx: mpsc::Sender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Runs every mapping and returns one outcome per mapping, in input order.
    ///
    /// `Err` only when no folder work could start: no stored credential,
    /// an unreadable credential, or rejected authentication. Dropping the
    /// returned future cancels in-flight downloads.
    pub async fn run_all(&self, mappings: &[FolderMapping]) -> CloudResult<Vec<SyncOutcome>> {
        self.emit(SyncEvent::RunStarted {
            folders: mappings.len(),
        });

        match self.run_folders(mappings).await {
            Ok(outcomes) => {
                let finished = SyncEvent::finished(&outcomes);
                if let SyncEvent::RunFinished {
                    succeeded,
                    partial,
                    failed,
                } = &finished
                {
                    info!("sync run finished: {succeeded} succeeded, {partial} partial, {failed} failed");
                }
                self.emit(finished);
                Ok(outcomes)
            }
            Err(e) => {
                match &e {
                    CloudError::NoCredential => info!("sync skipped: no credential provisioned"),
                    other => warn!("sync run aborted: {other}"),
                }
                self.emit(SyncEvent::failed(&e));
                Err(e)
            }
        }
    }

    async fn run_folders(&self, mappings: &[FolderMapping]) -> CloudResult<Vec<SyncOutcome>> {
        let credential = self.load_credential().await?;

        let session = self
            .remote
            .authenticate(&credential)
            .await
            .map_err(|e| match e {
                CloudError::AuthFailed(_) => e,
                other => CloudError::AuthFailed(other.to_string()),
            })?;
        drop(credential);

        let outcomes = if session.supports_concurrent_requests() {
            join_all(mappings.iter().map(|m| self.mirror_one(m, session.as_ref()))).await
        } else {
            debug!("remote session is not concurrent, mirroring folders one at a time");
            let mut outcomes = Vec::with_capacity(mappings.len());
            for mapping in mappings {
                outcomes.push(self.mirror_one(mapping, session.as_ref()).await);
            }
            outcomes
        };
        Ok(outcomes)
    }

    /// Vault I/O and decryption run on the blocking pool.
    async fn load_credential(&self) -> CloudResult<Credential> {
        let vault = self.vault.clone();
        let loaded = tokio::task::spawn_blocking(move || vault.load())
            .await
            .map_err(|e| CloudError::LocalStorage(format!("vault worker failed: {e}")))??;
        loaded.ok_or(CloudError::NoCredential)
    }

    async fn mirror_one(&self, mapping: &FolderMapping, session: &dyn RemoteSession) -> SyncOutcome {
        let outcome = self.engine.mirror(mapping, session).await;
        self.emit(SyncEvent::FolderCompleted(outcome.clone()));
        outcome
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                debug!("sync event dropped: {e}");
            }
        }
    }
}
