//! Bookkeeping records for persisted full aggregates.
//!
//! One small JSON record per stats key describes which date range the
//! aggregate on disk was built from and when. A missing or malformed record
//! is an expected steady state (first run, interrupted rebuild), so reads
//! return `None` rather than an error; the engine treats that as "must
//! rebuild". Writes always overwrite.

use std::sync::Arc;

use tracing::debug;

use crate::models::{BookkeepingRecord, StatsKey};
use crate::storage::{StorageClient, StorageResult};

/// Persists coverage metadata for full aggregates, one record per key.
pub struct BookkeepingStore {
    storage: Arc<dyn StorageClient>,
    base_path: String,
}

impl BookkeepingStore {
    pub fn new(storage: Arc<dyn StorageClient>, base_path: impl Into<String>) -> Self {
        Self {
            storage,
            base_path: base_path.into(),
        }
    }

    /// Read the record for `key`, if a usable one exists.
    pub async fn read(&self, key: &StatsKey) -> Option<BookkeepingRecord> {
        let path = key.bookkeeping_path(&self.base_path);

        let contents = match self.storage.read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(key = %key, error = %e, "No bookkeeping record found");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(key = %key, error = %e, "Ignoring malformed bookkeeping record");
                None
            }
        }
    }

    /// Overwrite the record for `key`, creating parent directories as needed.
    pub async fn write(&self, key: &StatsKey, record: &BookkeepingRecord) -> StorageResult<()> {
        let path = key.bookkeeping_path(&self.base_path);
        if let Some(parent) = parent_of(&path) {
            self.storage.makedirs(parent).await?;
        }

        let contents =
            serde_json::to_string(record).expect("bookkeeping record serialization is infallible");
        self.storage.write_string(&path, &contents).await
    }
}

fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}
