use super::{DocumentStore, StoreError, StoreResult, sanitize_collection};
use crate::types::FileRecord;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Collections stored as JSON arrays, one file per collection.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(default_root())
    }
}

fn default_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("groupshare").join("store");
    }

    PathBuf::from("cache").join("store")
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", sanitize_collection(collection)))
    }

    fn read_collection(&self, collection: &str) -> StoreResult<Vec<FileRecord>> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<FileRecord>> {
        self.read_collection(collection)
    }

    async fn append(&self, collection: &str, record: &FileRecord) -> StoreResult<String> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut records = self.read_collection(collection)?;
        records.push(record.clone());

        fs::create_dir_all(&self.root)?;
        let path = self.collection_path(collection);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(&records)?)?;
        fs::rename(&staging, &path)?;

        Ok(format!("{}/{}", sanitize_collection(collection), records.len()))
    }
}
