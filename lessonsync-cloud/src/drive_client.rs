//! Drive v3 REST client implementing the remote store capability.
//!
//! Authenticates with a service-account document (signed JWT assertion
//! exchanged for a bearer token), lists folders page by page, and streams
//! file contents. A 401 on any call triggers one token refresh and a retry.

use crate::config::SyncConfig;
use crate::error::{CloudError, CloudResult};
use crate::remote::{ByteStream, RemoteSession, RemoteStore};
use crate::service_account::{JWT_BEARER_GRANT, ServiceAccountKey};
use crate::types::FileMeta;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use lessonsync_vault::Credential;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const LIST_FIELDS: &str = "nextPageToken,files(id,name,modifiedTime,mimeType)";
const PAGE_SIZE: &str = "1000";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    modified_time: DateTime<Utc>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl From<DriveFile> for FileMeta {
    fn from(f: DriveFile) -> Self {
        FileMeta {
            id: f.id,
            name: f.name,
            modified_at: f.modified_time,
            mime_type: f.mime_type,
        }
    }
}

// ============================================================================
// Token source
// ============================================================================

/// Exchanges signed assertions for access tokens.
struct TokenSource {
    client: Client,
    key: ServiceAccountKey,
    scope: String,
    timeout: Duration,
}

impl TokenSource {
    async fn fetch(&self) -> CloudResult<String> {
        let assertion = self.key.sign_assertion(&self.scope)?;
        let resp = self
            .client
            .post(&self.key.token_uri)
            .timeout(self.timeout)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CloudError::AuthFailed(format!("token endpoint unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::AuthFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CloudError::AuthFailed(format!("malformed token response: {e}")))?;
        Ok(token.access_token)
    }
}

// ============================================================================
// DriveStore
// ============================================================================

/// Remote store backed by the Drive v3 API.
pub struct DriveStore {
    client: Client,
    config: SyncConfig,
}

impl DriveStore {
    pub fn new(config: SyncConfig) -> CloudResult<Self> {
        // Downloads can legitimately run long; only connecting is bounded
        // client-wide. Metadata calls set their own timeout.
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn authenticate(&self, credential: &Credential) -> CloudResult<Arc<dyn RemoteSession>> {
        let key = ServiceAccountKey::from_credential(credential)?;
        let account = key.client_email.clone();

        let tokens = TokenSource {
            client: self.client.clone(),
            key,
            scope: self.config.oauth_scope.clone(),
            timeout: self.config.request_timeout(),
        };
        let access_token = tokens.fetch().await?;

        let session = DriveSession {
            client: self.client.clone(),
            files_url: format!(
                "{}/drive/v3/files",
                self.config.api_base_url.trim_end_matches('/')
            ),
            timeout: self.config.request_timeout(),
            tokens,
            auth: RwLock::new(TokenState {
                access_token,
                generation: 0,
            }),
            refresh_lock: Mutex::new(()),
        };

        if let Some(probe) = &self.config.probe_folder_id {
            session.check_folder(probe).await.map_err(|reason| {
                CloudError::AuthFailed(format!("connection test on {probe} failed: {reason}"))
            })?;
        }

        info!("authenticated to Drive as {account}");
        Ok(Arc::new(session))
    }
}

// ============================================================================
// DriveSession
// ============================================================================

struct TokenState {
    access_token: String,
    /// Bumped on every successful refresh so concurrent 401s refresh once.
    generation: u64,
}

/// An authenticated Drive session.
pub struct DriveSession {
    client: Client,
    files_url: String,
    timeout: Duration,
    tokens: TokenSource,
    auth: RwLock<TokenState>,
    refresh_lock: Mutex<()>,
}

impl DriveSession {
    async fn refresh(&self, seen_generation: u64) -> CloudResult<String> {
        let _guard = self.refresh_lock.lock().await;

        // Someone else refreshed while we waited.
        {
            let auth = self.auth.read().await;
            if auth.generation > seen_generation {
                return Ok(auth.access_token.clone());
            }
        }

        let token = self.tokens.fetch().await?;
        let mut auth = self.auth.write().await;
        auth.access_token = token.clone();
        auth.generation += 1;
        debug!("access token refreshed (generation {})", auth.generation);
        Ok(token)
    }

    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Option<Duration>,
        token: &str,
    ) -> RequestBuilder {
        let req = self.client.get(url).bearer_auth(token).query(query);
        match timeout {
            Some(t) => req.timeout(t),
            None => req,
        }
    }

    /// Authenticated GET, retried once with a fresh token on 401.
    async fn auth_get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> CloudResult<Response> {
        let (token, generation) = {
            let auth = self.auth.read().await;
            (auth.access_token.clone(), auth.generation)
        };

        let resp = self.get(url, query, timeout, &token).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!("access token rejected, refreshing");
        let token = self.refresh(generation).await?;
        Ok(self.get(url, query, timeout, &token).send().await?)
    }

    /// Confirms `folder_id` exists and is visible to this account.
    async fn check_folder(&self, folder_id: &str) -> Result<(), String> {
        let url = format!("{}/{}", self.files_url, folder_id);
        let resp = self
            .auth_get(&url, &[("fields", "id,mimeType")], Some(self.timeout))
            .await
            .map_err(|e| e.to_string())?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                Err("folder not found or not accessible".to_string())
            }
            s => Err(format!("metadata request returned {s}")),
        }
    }

    async fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<DriveFileList, String> {
        let mut params = vec![
            ("q", query),
            ("fields", LIST_FIELDS),
            ("pageSize", PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let resp = self
            .auth_get(&self.files_url, &params, Some(self.timeout))
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("listing returned {status}"));
        }
        resp.json().await.map_err(|e| format!("malformed listing: {e}"))
    }
}

/// Quotes a value for a Drive `q` expression.
fn quote_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl RemoteSession for DriveSession {
    async fn list_folder(&self, folder_id: &str) -> CloudResult<Vec<FileMeta>> {
        let list_err = |reason: String| CloudError::RemoteList {
            folder_id: folder_id.to_string(),
            reason,
        };

        self.check_folder(folder_id).await.map_err(list_err)?;

        let query = format!(
            "'{}' in parents and trashed = false",
            quote_query_value(folder_id)
        );
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_page(&query, page_token.as_deref())
                .await
                .map_err(list_err)?;
            debug!("listed {} entries in folder {folder_id}", page.files.len());
            files.extend(
                page.files
                    .into_iter()
                    .map(FileMeta::from)
                    .filter(|f| !f.is_folder()),
            );
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn download_file(&self, file_id: &str) -> CloudResult<ByteStream> {
        let fetch_err = |reason: String| CloudError::RemoteFetch {
            file_id: file_id.to_string(),
            reason,
        };

        let url = format!("{}/{}", self.files_url, file_id);
        let resp = self
            .auth_get(&url, &[("alt", "media")], None)
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("download of {file_id} returned {status}");
            return Err(fetch_err(format!("download returned {status}")));
        }

        let id = file_id.to_string();
        Ok(resp
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| CloudError::RemoteFetch {
                    file_id: id.clone(),
                    reason: e.to_string(),
                })
            })
            .boxed())
    }
}
