//! Incremental statistics engine.
//!
//! Orchestrates one statistic run: decide whether the persisted full
//! aggregate is usable, rebuild it when it is not, aggregate whatever
//! incremental events have arrived, merge, and rank. Intermediate datasets
//! are named tables registered on the engine's `SessionContext`, and each
//! stage's output is the explicit input of the next stage.
//!
//! The engine assumes a single writer per stats key: an external scheduler
//! serializes invocations, so no locking guards the bookkeeping record or the
//! aggregate directory. Racing invocations would double-write both, which
//! wastes work but cannot corrupt results (artifacts are always rewritten in
//! full).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use datafusion::datasource::MemTable;
use datafusion::error::DataFusionError;
use datafusion::physical_plan::SendableRecordBatchStream;
use datafusion::prelude::{DataFrame, ParquetReadOptions, SessionContext};
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregates::{AggregateCacheError, AggregateTableCache};
use crate::bookkeeping::BookkeepingStore;
use crate::config::{ListenCountLimits, PlayrankConfig};
use crate::events::{EventSource, EventSourceError};
use crate::models::{BookkeepingRecord, DateRange, Scope, StatsKey, StatsRange};
use crate::providers::StatsQueryProvider;
use crate::storage::{StorageClient, StorageError};

/// Errors from a statistic run.
///
/// Absence of a bookkeeping record or cached aggregate is not an error;
/// it triggers a rebuild. Everything here is an infrastructure failure; the
/// invoking scheduler decides whether to retry the whole run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Query execution failed: {0}")]
    Query(#[from] DataFusionError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Event source failed: {0}")]
    Events(#[from] EventSourceError),
}

impl From<AggregateCacheError> for EngineError {
    fn from(e: AggregateCacheError) -> Self {
        match e {
            AggregateCacheError::Storage(e) => EngineError::Storage(e),
            AggregateCacheError::Query(e) => EngineError::Query(e),
        }
    }
}

/// One run's ranked output plus the window that produced it.
pub struct GeneratedStats {
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    /// Lazy, forward-only, single-pass row stream. Consuming it twice
    /// requires re-running the statistic.
    pub rows: SendableRecordBatchStream,
}

/// Computes ranked statistics incrementally against persisted aggregates.
pub struct IncrementalStatsEngine {
    ctx: SessionContext,
    bookkeeping: BookkeepingStore,
    aggregates: AggregateTableCache,
    events: Arc<dyn EventSource>,
    storage_base: String,
    top_entity_limit: u32,
    listen_count_limits: ListenCountLimits,
}

impl IncrementalStatsEngine {
    pub fn new(
        ctx: SessionContext,
        storage: Arc<dyn StorageClient>,
        events: Arc<dyn EventSource>,
        config: &PlayrankConfig,
    ) -> Self {
        let base = config.storage.base_path.clone();
        Self {
            bookkeeping: BookkeepingStore::new(storage.clone(), base.clone()),
            aggregates: AggregateTableCache::new(ctx.clone(), storage, base.clone()),
            ctx,
            events,
            storage_base: base,
            top_entity_limit: config.stats.top_entity_limit,
            listen_count_limits: config.stats.listen_count_limits.clone(),
        }
    }

    /// Run one statistic over `range`, returning the ranked rows.
    pub async fn generate_stats(
        &self,
        provider: &dyn StatsQueryProvider,
        stats_range: StatsRange,
        range: &DateRange,
    ) -> Result<GeneratedStats, EngineError> {
        self.generate_stats_with_limit(provider, stats_range, range, self.top_entity_limit)
            .await
    }

    /// Like [`generate_stats`](Self::generate_stats) with an explicit
    /// top-entity limit.
    pub async fn generate_stats_with_limit(
        &self,
        provider: &dyn StatsQueryProvider,
        stats_range: StatsRange,
        range: &DateRange,
        top_entity_limit: u32,
    ) -> Result<GeneratedStats, EngineError> {
        let key = StatsKey::new(provider.entity(), provider.scope(), stats_range);
        let prefix = key.table_prefix();

        // Lookup datasets first, so aggregation queries can reference them.
        let mut cache_names = Vec::new();
        for (idx, rel_path) in provider.cache_tables().iter().enumerate() {
            let name = format!("{prefix}_cache_{idx}");
            let path = format!("{}/{}", self.storage_base.trim_end_matches('/'), rel_path);
            let df = self
                .ctx
                .read_parquet(path, ParquetReadOptions::default())
                .await?;
            self.register_view(&name, df)?;
            cache_names.push(name);
        }

        // A stored aggregate is usable iff it starts where this run starts.
        // `to_date` always tracks "now", and everything past the stored
        // `to_date` arrives through the incremental dataset.
        let record = self.bookkeeping.read(&key).await;
        let existing_usable = record
            .as_ref()
            .is_some_and(|r| r.from_date == range.from_date);

        let listen_count_limit = match provider.scope() {
            Scope::Sitewide => Some(self.listen_count_limits.limit_for(stats_range)),
            Scope::User => None,
        };

        if !self.aggregates.exists(&key).await? || !existing_usable {
            info!(
                key = %key,
                from_date = %range.from_date,
                to_date = %range.to_date,
                "Rebuilding full aggregate"
            );

            let listens_table = format!("{prefix}_full_listens");
            let listens = self.events.full_events(range).await?;
            self.register_view(&listens_table, listens)?;

            let sql = provider.aggregate_query(&listens_table, &cache_names, listen_count_limit);
            let full = self.ctx.sql(&sql).await?;
            self.aggregates.write(&key, full).await?;

            let record = BookkeepingRecord {
                from_date: range.from_date,
                to_date: range.to_date,
                created: Utc::now(),
            };
            self.bookkeeping.write(&key, &record).await?;
        } else {
            debug!(key = %key, "Existing full aggregate is usable");
        }

        let schema = provider.partial_aggregate_schema();
        let full_table = format!("{prefix}_existing_aggregate");
        let full = self.aggregates.read(&key, schema.as_ref()).await?;
        self.register_view(&full_table, full)?;

        let incremental_table = format!("{prefix}_incremental_aggregate");
        let incremental = match self.events.incremental_events().await? {
            Some(listens) => {
                let listens_table = format!("{prefix}_incremental_listens");
                self.register_view(&listens_table, listens)?;
                let sql =
                    provider.aggregate_query(&listens_table, &cache_names, listen_count_limit);
                self.ctx.sql(&sql).await?
            }
            None => {
                debug!(key = %key, "No incremental events, defaulting to an empty aggregate");
                let empty = MemTable::try_new(schema.clone(), vec![vec![]])?;
                self.ctx.read_table(Arc::new(empty))?
            }
        };
        self.register_view(&incremental_table, incremental)?;

        let combined_table = format!("{prefix}_combined_aggregate");
        let combined = self
            .ctx
            .sql(&provider.combine_query(&full_table, &incremental_table))
            .await?;
        self.register_view(&combined_table, combined)?;

        let results = self
            .ctx
            .sql(&provider.top_n_query(&combined_table, top_entity_limit, &cache_names))
            .await?;

        let rows = results.execute_stream().await?;
        Ok(GeneratedStats {
            from_date: range.from_date,
            to_date: range.to_date,
            rows,
        })
    }

    /// Register `df` under `name`, replacing any table from a previous run.
    fn register_view(&self, name: &str, df: DataFrame) -> Result<(), DataFusionError> {
        self.ctx.deregister_table(name)?;
        self.ctx.register_table(name, df.into_view())?;
        Ok(())
    }
}
