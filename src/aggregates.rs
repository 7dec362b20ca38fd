//! Persisted full-aggregate cache.
//!
//! The full aggregate for a stats key lives as a Parquet directory on
//! storage. A rebuild removes the directory and rewrites it in full, so a
//! reader never observes a partially patched artifact. Absence is expected
//! (first run for a key) and reported through [`AggregateTableCache::exists`]
//! rather than a read error.

use std::sync::Arc;

use datafusion::arrow::datatypes::Schema;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::{DataFrame, ParquetReadOptions, SessionContext};
use thiserror::Error;
use tracing::debug;

use crate::models::StatsKey;
use crate::storage::{StorageClient, StorageError};

/// Errors from aggregate cache operations.
#[derive(Debug, Error)]
pub enum AggregateCacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Query(#[from] datafusion::error::DataFusionError),
}

/// Locates and persists full aggregates on storage.
pub struct AggregateTableCache {
    ctx: SessionContext,
    storage: Arc<dyn StorageClient>,
    base_path: String,
}

impl AggregateTableCache {
    pub fn new(
        ctx: SessionContext,
        storage: Arc<dyn StorageClient>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            storage,
            base_path: base_path.into(),
        }
    }

    /// Whether a persisted aggregate exists for `key`.
    pub async fn exists(&self, key: &StatsKey) -> Result<bool, AggregateCacheError> {
        Ok(self
            .storage
            .exists(&key.aggregate_path(&self.base_path))
            .await?)
    }

    /// Lazily scan the persisted aggregate for `key`.
    ///
    /// The caller supplies the partial-aggregate schema instead of relying
    /// on inference: a rebuild over an empty event window leaves a directory
    /// with no data files, and such an aggregate must still read as an empty
    /// dataset with the right columns.
    pub async fn read(
        &self,
        key: &StatsKey,
        schema: &Schema,
    ) -> Result<DataFrame, AggregateCacheError> {
        let path = key.aggregate_path(&self.base_path);
        Ok(self
            .ctx
            .read_parquet(path, ParquetReadOptions::default().schema(schema))
            .await?)
    }

    /// Replace the persisted aggregate for `key` with `dataset`.
    pub async fn write(
        &self,
        key: &StatsKey,
        dataset: DataFrame,
    ) -> Result<(), AggregateCacheError> {
        let path = key.aggregate_path(&self.base_path);

        self.storage.remove_all(&path).await?;
        self.storage.makedirs(&path).await?;

        debug!(key = %key, path = %path, "Writing full aggregate");
        dataset
            .write_parquet(&path, DataFrameWriteOptions::new(), None)
            .await?;
        Ok(())
    }
}
