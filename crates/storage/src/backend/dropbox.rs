//! Dropbox HTTP API v2 remote store.
//!
//! Metadata calls go to the RPC host (`api.dropboxapi.com`) with JSON bodies;
//! file contents go to the content host (`content.dropboxapi.com`), where the
//! call arguments travel in the `Dropbox-API-Arg` header instead. Every call
//! made here is a single attempt: wrap the backend in a
//! [`ResilientBackend`](super::ResilientBackend) for retries.

use crate::credentials::{CredentialSource, Credentials};
use crate::error::{ErrorKind, Result};
use crate::models::Page;
use crate::{RemoteEntry, RemoteStore, WriteMode, path::normalize};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::header::{CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::RwLock;
use tracing::instrument;

const API_URL: &str = "https://api.dropboxapi.com/2/files";
const CONTENT_URL: &str = "https://content.dropboxapi.com/2/files";
const TOKEN_URL: &str = "https://api.dropbox.com/oauth2/token";
const API_ARG: &str = "Dropbox-API-Arg";

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
enum Metadata {
    File {
        name: String,
        path_display: Option<String>,
        size: u64,
        server_modified: Option<String>,
    },
    Folder {
        name: String,
        path_display: Option<String>,
    },
    Deleted {
        #[allow(dead_code)]
        name: String,
    },
}
impl Metadata {
    /// Deleted tombstones have no counterpart in a [`RemoteEntry`].
    fn into_entry(self, folder: &str) -> Option<RemoteEntry> {
        let display =
            |name: &str, path_display: Option<String>| path_display.unwrap_or_else(|| format!("{folder}/{name}"));
        match self {
            Self::File { name, path_display, size, server_modified } => {
                let entry = RemoteEntry::file(display(&name, path_display), size);
                Some(match server_modified.and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()) {
                    Some(modified) => entry.with_modified(modified),
                    None => entry,
                })
            },
            Self::Folder { name, path_display } => Some(RemoteEntry::folder(display(&name, path_display))),
            Self::Deleted { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Metadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_summary: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Remote store backed by the Dropbox HTTP API.
///
/// With [`Credentials::RefreshToken`] a short-lived access token is minted on
/// first use and re-minted whenever Dropbox reports it expired. With a plain
/// [`Credentials::AccessToken`] a rejected token is fatal.
///
/// Dropbox compares paths case-insensitively and returns entries with their
/// display case, which is what ends up in [`RemoteEntry::path`].
pub struct DropboxBackend {
    name: String,
    http: Client,
    credentials: Credentials,
    token: RwLock<Option<String>>,
    page_size: u32,
}
impl DropboxBackend {
    pub fn new(name: impl Into<String>, source: &dyn CredentialSource, page_size: u32) -> Result<Self> {
        let credentials = source.credentials()?;
        let token = match &credentials {
            Credentials::AccessToken(token) => Some(token.clone()),
            Credentials::RefreshToken { .. } => None,
        };
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("mediamig/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Backend("unable to build HTTP client".to_string()))?;
        Ok(Self {
            name: name.into(),
            http,
            credentials,
            token: RwLock::new(token),
            page_size: page_size.clamp(1, 2000),
        })
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.refresh(None).await
    }

    /// Mint a new access token, unless another task already replaced `stale`.
    async fn refresh(&self, stale: Option<&str>) -> Result<String> {
        let Credentials::RefreshToken { refresh_token, app_key, app_secret } = &self.credentials else {
            exn::bail!(ErrorKind::Unauthorized("access token rejected and no refresh token configured".to_string()));
        };
        let mut token = self.token.write().await;
        if let Some(current) = token.as_deref()
            && Some(current) != stale
        {
            return Ok(current.to_string());
        }
        tracing::debug!(backend = %self.name, "Refreshing Dropbox access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", app_key.as_str()),
            ("client_secret", app_secret.as_str()),
        ];
        let response = Self::dispatch(self.http.post(TOKEN_URL).form(&form)).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // A revoked or mistyped refresh token will not get better by retrying.
            if status.is_client_error() {
                exn::bail!(ErrorKind::Unauthorized(format!("token refresh rejected: {}", summary(&body))));
            }
            exn::bail!(classify_failure(status, &body, TOKEN_URL, None));
        }
        let fresh: TokenResponse =
            response.json().await.or_raise(|| ErrorKind::Backend("malformed token response".to_string()))?;
        *token = Some(fresh.access_token.clone());
        Ok(fresh.access_token)
    }

    async fn dispatch(request: RequestBuilder) -> Result<Response> {
        match request.send().await {
            Ok(response) => Ok(response),
            Err(e) => {
                let kind = transport_error(&e);
                Err(e).or_raise(|| kind)
            },
        }
    }

    /// Send an authenticated request, refreshing the token once if it expired.
    async fn call(&self, request: impl Fn(&Client) -> RequestBuilder, path: &str) -> Result<Response> {
        let token = self.access_token().await?;
        let mut response = Self::dispatch(request(&self.http).bearer_auth(&token)).await?;
        let refreshable = matches!(self.credentials, Credentials::RefreshToken { .. });
        if response.status() == StatusCode::UNAUTHORIZED && refreshable {
            let token = self.refresh(Some(&token)).await?;
            response = Self::dispatch(request(&self.http).bearer_auth(&token)).await?;
        }
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        exn::bail!(classify_failure(status, &body, path, retry_after))
    }

    async fn rpc<T: DeserializeOwned>(&self, endpoint: &str, args: Value, path: &str) -> Result<T> {
        let url = format!("{API_URL}/{endpoint}");
        let response = self.call(|http| http.post(&url).json(&args), path).await?;
        response
            .json()
            .await
            .or_raise(|| ErrorKind::Transient(format!("unreadable {endpoint} response for {path}")))
    }

    fn api_arg(args: &Value) -> Result<HeaderValue> {
        HeaderValue::from_str(&escape_header_json(&args.to_string()))
            .or_raise(|| ErrorKind::InvalidPath(args.to_string()))
    }
}

/// Dropbox wants the `Dropbox-API-Arg` header to be pure ASCII, so anything
/// beyond it is written as JSON `\u` escapes (surrogate pairs included).
fn escape_header_json(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    escaped
}

fn summary(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error_summary)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Map a non-success HTTP response onto an actionable error.
fn classify_failure(status: StatusCode, body: &str, path: &str, retry_after: Option<u64>) -> ErrorKind {
    let summary = summary(body);
    match status.as_u16() {
        401 | 403 => ErrorKind::Unauthorized(summary),
        409 if summary.contains("not_found") => ErrorKind::NotFound(path.to_string()),
        409 if summary.contains("conflict") => ErrorKind::AlreadyExists(path.to_string()),
        409 if summary.contains("too_many_write_operations") => ErrorKind::RateLimited(retry_after),
        409 if summary.contains("malformed_path") || summary.contains("disallowed_name") => {
            ErrorKind::InvalidPath(path.to_string())
        },
        429 => ErrorKind::RateLimited(retry_after),
        500..=599 => ErrorKind::Transient(format!("HTTP {status}: {summary}")),
        _ => ErrorKind::Backend(format!("HTTP {status}: {summary}")),
    }
}

fn transport_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        ErrorKind::Transient(e.to_string())
    } else {
        ErrorKind::Backend(e.to_string())
    }
}

#[async_trait]
impl RemoteStore for DropboxBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_page(&self, folder: &str, cursor: Option<&str>) -> Result<Page> {
        let folder = normalize(folder)?;
        let result: ListFolderResult = match cursor {
            None => {
                let args = json!({
                    "path": folder,
                    "recursive": false,
                    "include_deleted": false,
                    "limit": self.page_size,
                });
                self.rpc("list_folder", args, &folder).await?
            },
            Some(cursor) => self.rpc("list_folder/continue", json!({ "cursor": cursor }), &folder).await?,
        };
        tracing::trace!(folder = %folder, entries = result.entries.len(), has_more = result.has_more, "Listed page");
        Ok(Page {
            entries: result.entries.into_iter().filter_map(|m| m.into_entry(&folder)).collect(),
            cursor: result.has_more.then_some(result.cursor),
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        let path = normalize(path)?;
        // The API refuses metadata requests for the root itself.
        if path.is_empty() {
            return Ok(RemoteEntry::folder(""));
        }
        let metadata: Metadata = self.rpc("get_metadata", json!({ "path": path }), &path).await?;
        let folder = crate::path::parent(&path).to_string();
        metadata.into_entry(&folder).ok_or_raise(|| ErrorKind::NotFound(path))
    }

    #[instrument(level = "debug", skip(self))]
    async fn ensure_folder(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        if path.is_empty() {
            return Ok(());
        }
        let args = json!({ "path": path, "autorename": false });
        match self.rpc::<IgnoredAny>("create_folder_v2", args, &path).await {
            Ok(_) => Ok(()),
            Err(e) if matches!(&*e, ErrorKind::AlreadyExists(_)) => {
                // Conflicts are reported for files too; only a folder will do.
                if self.stat(&path).await?.is_folder() {
                    Ok(())
                } else {
                    exn::bail!(ErrorKind::Backend(format!("a file is in the way of folder {path}")))
                }
            },
            Err(e) => Err(e),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let args = json!({ "from_path": from, "to_path": to, "autorename": false });
        match self.rpc::<IgnoredAny>("copy_v2", args, &from).await {
            Ok(_) => Ok(()),
            Err(e) if matches!(&*e, ErrorKind::AlreadyExists(_)) => {
                tracing::debug!(from = %from, to = %to, "Copy destination already exists");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path)?;
        let arg = Self::api_arg(&json!({ "path": path }))?;
        let url = format!("{CONTENT_URL}/download");
        let response = self.call(|http| http.post(&url).header(API_ARG, arg.clone()), &path).await?;
        let bytes = response
            .bytes()
            .await
            .or_raise(|| ErrorKind::Transient(format!("download of {path} interrupted")))?;
        Ok(bytes.to_vec())
    }

    #[instrument(level = "debug", skip(self, data), fields(bytes = data.len()))]
    async fn upload(&self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        let path = normalize(path)?;
        let mode_tag = match mode {
            WriteMode::Add => "add",
            WriteMode::Overwrite => "overwrite",
        };
        let arg = Self::api_arg(&json!({
            "path": path,
            "mode": mode_tag,
            "autorename": false,
            "mute": true,
        }))?;
        let url = format!("{CONTENT_URL}/upload");
        let request = |http: &Client| {
            http.post(&url)
                .header(API_ARG, arg.clone())
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data.to_vec())
        };
        match self.call(request, &path).await {
            Ok(_) => Ok(()),
            Err(e) if mode == WriteMode::Add && matches!(&*e, ErrorKind::AlreadyExists(_)) => {
                tracing::debug!(path = %path, "Upload destination already exists");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }
}
