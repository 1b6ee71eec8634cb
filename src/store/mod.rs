//! Document store holding the shared file list.
//!
//! The store only knows one document shape, `{ name }`, appended to a named
//! collection and read back as a whole.

#[cfg(not(target_arch = "wasm32"))]
mod file;
mod firestore;
mod memory;

use crate::config::{AppConfig, StoreBackend};
use crate::types::FileRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether trying the same call again might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            StoreError::Status { status, .. } => *status == 429 || *status >= 500,
            StoreError::Io(_) | StoreError::Unavailable(_) => true,
            StoreError::Decode(_) => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in `collection`, in the store's natural order.
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<FileRecord>>;

    /// Append one document and return its id.
    async fn append(&self, collection: &str, record: &FileRecord) -> StoreResult<String>;
}

/// Build the backend named by the configuration.
pub fn from_config(config: &AppConfig) -> Arc<dyn DocumentStore> {
    match &config.store {
        StoreBackend::Firestore(firestore) => Arc::new(FirestoreStore::new(firestore.clone())),
        StoreBackend::Memory => Arc::new(MemoryStore::default()),
        #[cfg(not(target_arch = "wasm32"))]
        StoreBackend::Local => Arc::new(FileStore::default()),
        #[cfg(target_arch = "wasm32")]
        StoreBackend::Local => Arc::new(MemoryStore::default()),
    }
}

/// Retry schedule for store writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay: Duration::from_millis(250),
        }
    }

    /// Delay before attempt `attempt + 1`, doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        self.base_delay.saturating_mul(factor)
    }
}

/// Append `record`, retrying transient failures with exponential backoff.
/// The last error is returned once the attempts run out.
pub async fn append_with_retry(
    store: &dyn DocumentStore,
    collection: &str,
    record: &FileRecord,
    policy: RetryPolicy,
) -> StoreResult<String> {
    let mut attempt = 1;
    loop {
        match store.append(collection, record).await {
            Ok(id) => {
                tracing::debug!(collection, name = %record.name, id = %id, attempt, "stored file record");
                return Ok(id);
            }
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    collection,
                    name = %record.name,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %err,
                    "store write failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(collection, name = %record.name, attempt, error = %err, "store write failed");
                return Err(err);
            }
        }
    }
}

/// Make a collection name safe to use as a file name.
pub(crate) fn sanitize_collection(collection: &str) -> String {
    collection
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}
