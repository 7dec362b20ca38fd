//! Incremental maintenance of ranked listening statistics.
//!
//! `playrank` keeps a long-lived "full" aggregate of an append-only listen
//! event log on disk (Parquet), together with a bookkeeping record describing
//! the date range the aggregate was built from. Each invocation aggregates
//! only the newly arrived incremental events, merges them with the persisted
//! full aggregate, and extracts a ranked top-N result as a lazy row stream.
//! No run re-reads the entire history unless the coverage window moved.
//!
//! The query substrate is Apache DataFusion: intermediate datasets are named
//! tables registered on a [`datafusion::prelude::SessionContext`], and every
//! pipeline stage is SQL supplied by a [`providers::StatsQueryProvider`]
//! variant. The engine depends only on that contract, never on a concrete
//! statistic.

pub mod aggregates;
pub mod bookkeeping;
pub mod config;
pub mod engine;
pub mod events;
pub mod messages;
pub mod models;
pub mod observability;
pub mod providers;
pub mod ranges;
pub mod storage;

#[cfg(test)]
mod tests;
