//! Key-value store module
//!
//! The guestbook persists everything in a flat key-value namespace:
//! messages under `message:{id}` and fallback attachments under `file:{id}`.
//! Backends:
//! - `memory` - process-local map, used by tests and throwaway instances
//! - `file` - one file per key in a data directory
//! - `cloudflare` - a hosted Workers KV namespace over the REST API

mod cloudflare;
mod file;
mod memory;

pub use cloudflare::CloudflareKvStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use hyper::body::Bytes;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// A stored value plus optional JSON metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvEntry {
    pub value: Bytes,
    pub metadata: Option<serde_json::Value>,
}

impl KvEntry {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("KV request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("KV backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("storage misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<KvEntry>, StoreError>;

    async fn put(&self, key: &str, entry: KvEntry) -> Result<(), StoreError>;

    /// Keys starting with `prefix`, in key order, at most `limit` of them
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}

/// Open the backend named in the storage configuration
pub fn open(
    config: &StorageConfig,
    client: &reqwest::Client,
) -> Result<Arc<dyn KvStore>, StoreError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => Ok(Arc::new(FileStore::open(&config.data_dir)?)),
        StorageBackend::Cloudflare => {
            let cf = config.cloudflare.as_ref().ok_or_else(|| {
                StoreError::Config("storage.cloudflare section is required".to_string())
            })?;
            Ok(Arc::new(CloudflareKvStore::new(cf.clone(), client.clone())))
        }
    }
}

/// Reject keys no backend can address
fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.len() > 512 || key.chars().any(char::is_control) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("message:abc").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("bad\nkey").is_err());
        assert!(validate_key(&"k".repeat(513)).is_err());
    }

    #[test]
    fn test_open_cloudflare_requires_section() {
        let config = StorageConfig {
            backend: StorageBackend::Cloudflare,
            data_dir: "data".to_string(),
            list_limit: 100,
            cloudflare: None,
        };
        let result = open(&config, &reqwest::Client::new());
        assert!(matches!(result, Err(StoreError::Config(_))));
    }
}
