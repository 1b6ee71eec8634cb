use super::{DocumentStore, StoreResult};
use crate::types::FileRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store. Used in tests, and for `local` on wasm targets.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<FileRecord>>>,
}

impl MemoryStore {
    pub fn with_files<I, S>(collection: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        if let Ok(mut collections) = store.collections.lock() {
            collections.insert(
                collection.to_string(),
                names.into_iter().map(|name| FileRecord::new(name, Default::default())).collect(),
            );
        }
        store
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<FileRecord>> {
        let collections = self
            .collections
            .lock()
            .map_err(|e| super::StoreError::Unavailable(e.to_string()))?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn append(&self, collection: &str, record: &FileRecord) -> StoreResult<String> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|e| super::StoreError::Unavailable(e.to_string()))?;
        let docs = collections.entry(collection.to_string()).or_default();
        docs.push(FileRecord::new(record.name.clone(), Default::default()));
        Ok(format!("mem-{}", docs.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;

    #[tokio::test]
    async fn test_append_then_fetch() {
        let store = MemoryStore::with_files("files", ["syllabus.pdf"]);
        let id = store
            .append("files", &FileRecord::new("notes.pptx", Origin::Local))
            .await
            .unwrap();
        assert_eq!(id, "mem-2");

        let names: Vec<_> = store
            .fetch_all("files")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["syllabus.pdf", "notes.pptx"]);
        assert!(store.fetch_all("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_origin_is_not_stored() {
        let store = MemoryStore::default();
        store
            .append("files", &FileRecord::new("a.pdf", Origin::Remote))
            .await
            .unwrap();
        let records = store.fetch_all("files").await.unwrap();
        assert_eq!(records[0].origin, Origin::Stored);
    }
}
