// Directory-backed key-value store
//
// Each key maps to `<encoded>.val` holding the raw value and, when present,
// `<encoded>.meta` holding the JSON metadata. Keys are percent-encoded so
// that separators like ':' and '/' never reach the filesystem.

use async_trait::async_trait;
use hyper::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{validate_key, KvEntry, KvStore, StoreError};

const VALUE_EXT: &str = "val";
const META_EXT: &str = "meta";

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the data directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{ext}", encode_key(key)))
    }
}

#[async_trait]
impl KvStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<KvEntry>, StoreError> {
        validate_key(key)?;
        let value = match fs::read(self.path_for(key, VALUE_EXT)).await {
            Ok(v) => Bytes::from(v),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata = match fs::read(self.path_for(key, META_EXT)).await {
            Ok(raw) => Some(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Some(KvEntry { value, metadata }))
    }

    async fn put(&self, key: &str, entry: KvEntry) -> Result<(), StoreError> {
        validate_key(key)?;

        // Metadata first: a value file is only visible once complete
        match &entry.metadata {
            Some(meta) => {
                write_atomic(&self.path_for(key, META_EXT), &serde_json::to_vec(meta)?).await?;
            }
            None => match fs::remove_file(self.path_for(key, META_EXT)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        write_atomic(&self.path_for(key, VALUE_EXT), &entry.value).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let file_name = item.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(encoded) = name
                .strip_suffix(VALUE_EXT)
                .and_then(|n| n.strip_suffix('.'))
            else {
                continue;
            };
            if let Some(key) = decode_key(encoded) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        keys.truncate(limit);
        Ok(keys)
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await
}

fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn decode_key(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|k| k.into_owned())
}
