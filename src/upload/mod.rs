//! Attachment upload backends
//!
//! Exactly one backend is active per process, picked once from the upload
//! configuration:
//! 1. GitHub contents API when a token and repository are set
//! 2. Backblaze B2 when a key pair and bucket are set
//! 3. Otherwise the key-value store itself, with a much smaller size bound
//!
//! Handlers only see the `UploadBackend` trait object.

mod b2;
mod data_url;
mod github;
mod kv;

pub use b2::B2Backend;
pub use data_url::{parse_data_url, DataUrlError};
pub use github::GithubBackend;
pub use kv::{load_file, KvBackend};

use async_trait::async_trait;
use chrono::Utc;
use hyper::body::Bytes;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::http::mime;
use crate::logger;
use crate::store::{KvStore, StoreError};

/// A file received from a client, ready to be stored
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    /// Build from a multipart part. A missing or generic declared type is
    /// replaced by a guess from the file extension.
    pub fn new(filename: impl Into<String>, declared_type: Option<&str>, data: Bytes) -> Self {
        let filename = filename.into();
        let content_type = match declared_type.map(str::trim) {
            Some(t) if !t.is_empty() && t != mime::OCTET_STREAM => t.to_string(),
            _ => {
                let ext = Path::new(&filename).extension().and_then(|e| e.to_str());
                mime::get_content_type(ext).to_string()
            }
        };
        Self {
            filename,
            content_type,
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredUpload {
    pub url: String,
    pub key: String,
}

/// Short-lived credentials letting a browser upload straight to B2
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCredentials {
    pub authorization_token: String,
    pub upload_url: String,
    pub api_url: String,
    pub bucket_id: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("{backend} rejected the request with status {status}: {detail}")]
    Upstream {
        backend: &'static str,
        status: u16,
        detail: String,
    },

    #[error("{backend} request failed: {source}")]
    Request {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait UploadBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Largest accepted file, in bytes (inclusive)
    fn max_size(&self) -> u64;

    /// Store the bytes; size has already been checked
    async fn put(&self, file: &UploadedFile) -> Result<StoredUpload, UploadError>;

    /// Direct-upload credentials, only meaningful for B2
    async fn upload_credentials(&self) -> Result<UploadCredentials, UploadError> {
        Err(UploadError::NotConfigured("B2"))
    }
}

/// Enforce the active backend's size bound, then store
pub async fn upload(
    backend: &dyn UploadBackend,
    file: &UploadedFile,
) -> Result<StoredUpload, UploadError> {
    let limit = backend.max_size();
    if file.size() > limit {
        return Err(UploadError::TooLarge {
            size: file.size(),
            limit,
        });
    }
    let stored = backend.put(file).await?;
    logger::log_info(&format!(
        "[Upload] {} ({} bytes, {}) -> {} via {}",
        file.filename,
        file.size(),
        file.content_type,
        stored.url,
        backend.name()
    ));
    Ok(stored)
}

/// Pick the upload backend from configuration
pub fn select_backend(
    config: &UploadConfig,
    store: Arc<dyn KvStore>,
    client: &reqwest::Client,
) -> Arc<dyn UploadBackend> {
    if let Some(github) = config.github.as_ref().filter(|g| g.is_configured()) {
        return Arc::new(GithubBackend::new(
            github.clone(),
            client.clone(),
            config.external_max_size,
        ));
    }
    if let Some(b2) = config.b2.as_ref().filter(|b| b.is_configured()) {
        return Arc::new(B2Backend::new(
            b2.clone(),
            client.clone(),
            config.external_max_size,
        ));
    }
    Arc::new(KvBackend::new(store, config.fallback_max_size))
}

/// Object path for external hosts: `{prefix}/{unix_ms}-{uuid}.{ext}`
pub fn object_path(prefix: &str, file: &UploadedFile) -> String {
    let ext = file_extension(file);
    let name = format!(
        "{}-{}.{ext}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

fn file_extension(file: &UploadedFile) -> String {
    let from_name = Path::new(&file.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            e.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(10)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|e| !e.is_empty());

    from_name
        .or_else(|| mime::extension_for(&file.content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string())
}

/// Send a request to an external host, turning transport errors and
/// non-2xx statuses into `UploadError`. Upstream bodies are logged only.
async fn send_checked(
    backend: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, UploadError> {
    let resp = request
        .send()
        .await
        .map_err(|source| UploadError::Request { backend, source })?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let detail = resp.text().await.unwrap_or_default();
    logger::log_error(&format!(
        "[Upload] {backend} responded {status}: {detail}"
    ));
    Err(UploadError::Upstream {
        backend,
        status: status.as_u16(),
        detail,
    })
}
