// Key-value store fallback backend
//
// Used when no external host is configured. Bytes are kept under
// `file:{id}` with their metadata and served back by `GET /api/files/{id}`.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{StoredUpload, UploadBackend, UploadError, UploadedFile};
use crate::http::mime;
use crate::store::{KvEntry, KvStore, StoreError};

pub const FILE_PREFIX: &str = "file:";

/// Route serving fallback-stored files
const FILES_ROUTE: &str = "/api/files/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub content_type: String,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: String,
}

/// A file read back from the store
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub metadata: FileMetadata,
    pub data: Bytes,
}

pub struct KvBackend {
    store: Arc<dyn KvStore>,
    max_size: u64,
}

impl KvBackend {
    pub fn new(store: Arc<dyn KvStore>, max_size: u64) -> Self {
        Self { store, max_size }
    }
}

#[async_trait]
impl UploadBackend for KvBackend {
    fn name(&self) -> &'static str {
        "kv"
    }

    fn max_size(&self) -> u64 {
        self.max_size
    }

    async fn put(&self, file: &UploadedFile) -> Result<StoredUpload, UploadError> {
        let id = Uuid::new_v4().to_string();
        let metadata = FileMetadata {
            content_type: file.content_type.clone(),
            filename: file.filename.clone(),
            size: file.size(),
            uploaded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let entry = KvEntry::new(file.data.clone())
            .with_metadata(serde_json::to_value(&metadata).map_err(StoreError::from)?);
        self.store.put(&format!("{FILE_PREFIX}{id}"), entry).await?;

        Ok(StoredUpload {
            url: format!("{FILES_ROUTE}{id}"),
            key: id,
        })
    }
}

/// Read a fallback-stored file by id. `None` when absent or the id is malformed.
pub async fn load_file(store: &dyn KvStore, id: &str) -> Result<Option<StoredFile>, StoreError> {
    if id.is_empty() || id.contains('/') || id.chars().any(char::is_control) {
        return Ok(None);
    }
    let Some(entry) = store.get(&format!("{FILE_PREFIX}{id}")).await? else {
        return Ok(None);
    };

    let metadata = entry
        .metadata
        .and_then(|m| serde_json::from_value::<FileMetadata>(m).ok())
        .unwrap_or_else(|| FileMetadata {
            content_type: mime::OCTET_STREAM.to_string(),
            filename: id.to_string(),
            size: entry.value.len() as u64,
            uploaded_at: String::new(),
        });

    Ok(Some(StoredFile {
        metadata,
        data: entry.value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::upload::upload;

    #[tokio::test]
    async fn test_round_trip() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let backend = KvBackend::new(store.clone(), 1024);

        let bytes: Vec<u8> = (0..=255).collect();
        let file = UploadedFile::new("pixel.png", Some("image/png"), Bytes::from(bytes.clone()));
        let stored = upload(&backend, &file).await.unwrap();
        assert_eq!(stored.url, format!("/api/files/{}", stored.key));

        let loaded = load_file(store.as_ref(), &stored.key).await.unwrap().unwrap();
        assert_eq!(&loaded.data[..], &bytes[..]);
        assert_eq!(loaded.metadata.content_type, "image/png");
        assert_eq!(loaded.metadata.filename, "pixel.png");
        assert_eq!(loaded.metadata.size, 256);
    }

    #[tokio::test]
    async fn test_unknown_or_bad_id() {
        let store = MemoryStore::new();
        assert!(load_file(&store, "nope").await.unwrap().is_none());
        assert!(load_file(&store, "").await.unwrap().is_none());
        assert!(load_file(&store, "../etc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_metadata_defaults() {
        let store = MemoryStore::new();
        store
            .put("file:raw", KvEntry::new("abc"))
            .await
            .unwrap();
        let loaded = load_file(&store, "raw").await.unwrap().unwrap();
        assert_eq!(loaded.metadata.content_type, "application/octet-stream");
        assert_eq!(loaded.metadata.size, 3);
    }
}
