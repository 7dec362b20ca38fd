//! Listen event sources.
//!
//! The engine reads two datasets: the full-history listen dump, filtered to
//! the requested date range, and an optional pre-seeded incremental dump
//! holding everything that arrived after the last full aggregate was built.
//! Both are external collaborators; this module only defines the seam and a
//! Parquet-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use datafusion::common::ScalarValue;
use datafusion::error::DataFusionError;
use datafusion::prelude::{DataFrame, ParquetReadOptions, SessionContext, col, lit};
use thiserror::Error;

use crate::models::DateRange;
use crate::storage::{StorageClient, StorageError};

/// Arrow schema of a raw listen event.
pub fn listens_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(
            "listened_at",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("user_id", DataType::Int64, false),
        Field::new("artist_name", DataType::Utf8, false),
        Field::new("artist_mbid", DataType::Utf8, true),
        Field::new("release_name", DataType::Utf8, true),
        Field::new("release_mbid", DataType::Utf8, true),
        Field::new("track_name", DataType::Utf8, true),
        Field::new("recording_mbid", DataType::Utf8, true),
    ]))
}

/// Errors from event source reads.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Query(#[from] DataFusionError),
}

/// Supplies the raw event datasets the engine aggregates over.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Full-history events restricted to `[from_date, to_date)`.
    async fn full_events(&self, range: &DateRange) -> Result<DataFrame, EventSourceError>;

    /// The incremental events dataset, if one has been seeded.
    async fn incremental_events(&self) -> Result<Option<DataFrame>, EventSourceError>;
}

/// Parquet-backed event source reading from well-known dump locations.
pub struct ParquetEventSource {
    ctx: SessionContext,
    storage: Arc<dyn StorageClient>,
    listens_path: String,
    incremental_path: String,
}

impl ParquetEventSource {
    pub fn new(
        ctx: SessionContext,
        storage: Arc<dyn StorageClient>,
        listens_path: impl Into<String>,
        incremental_path: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            storage,
            listens_path: listens_path.into(),
            incremental_path: incremental_path.into(),
        }
    }
}

#[async_trait]
impl EventSource for ParquetEventSource {
    async fn full_events(&self, range: &DateRange) -> Result<DataFrame, EventSourceError> {
        let df = self
            .ctx
            .read_parquet(self.listens_path.clone(), ParquetReadOptions::default())
            .await?;

        let from = ScalarValue::TimestampMillisecond(Some(range.from_date.timestamp_millis()), None);
        let to = ScalarValue::TimestampMillisecond(Some(range.to_date.timestamp_millis()), None);

        let filtered = df.filter(
            col("listened_at")
                .gt_eq(lit(from))
                .and(col("listened_at").lt(lit(to))),
        )?;
        Ok(filtered)
    }

    async fn incremental_events(&self) -> Result<Option<DataFrame>, EventSourceError> {
        if !self.storage.exists(&self.incremental_path).await? {
            return Ok(None);
        }

        let df = self
            .ctx
            .read_parquet(self.incremental_path.clone(), ParquetReadOptions::default())
            .await?;
        Ok(Some(df))
    }
}
