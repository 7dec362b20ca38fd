//! Sitewide listening activity histogram.
//!
//! Buckets listens into calendar segments sized to the stats range: days for
//! a week or month, months for a year, years for all time. The ranked output
//! is a single row whose `listening_activity` column holds the buckets in
//! chronological order; a message builder forwards that payload downstream.
//! Only segments with at least one listen appear.

use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use super::StatsQueryProvider;
use crate::models::{Entity, Scope, StatsRange};

/// Sitewide listening activity.
///
/// Merge law: additive. Listen counts sum per calendar segment.
pub struct SitewideListeningActivity {
    range: StatsRange,
}

impl SitewideListeningActivity {
    pub fn new(range: StatsRange) -> Self {
        Self { range }
    }

    /// `date_trunc` precision for this range.
    fn bucket(&self) -> &'static str {
        match self.range {
            StatsRange::Week | StatsRange::Month => "day",
            StatsRange::Year => "month",
            StatsRange::AllTime => "year",
        }
    }

    /// Display label format for one segment.
    fn label_format(&self) -> &'static str {
        match self.range {
            StatsRange::Week | StatsRange::Month => "%d %B %Y",
            StatsRange::Year => "%B %Y",
            StatsRange::AllTime => "%Y",
        }
    }
}

impl StatsQueryProvider for SitewideListeningActivity {
    fn entity(&self) -> Entity {
        Entity::ListeningActivity
    }

    fn scope(&self) -> Scope {
        Scope::Sitewide
    }

    fn partial_aggregate_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("time_range", DataType::Utf8, true),
            Field::new("segment", DataType::Int64, true),
            Field::new("listen_count", DataType::Int64, true),
        ]))
    }

    fn aggregate_query(
        &self,
        events_table: &str,
        _cache_tables: &[String],
        _listen_count_limit: Option<i64>,
    ) -> String {
        let bucket = self.bucket();
        let format = self.label_format();
        // `segment` keeps the bucket's epoch-second start so merged segments
        // stay chronologically sortable regardless of label format.
        format!(
            r#"
            SELECT to_char(date_trunc('{bucket}', listened_at), '{format}') AS time_range
                 , CAST(date_part('epoch', date_trunc('{bucket}', listened_at)) AS BIGINT) AS segment
                 , count(*) AS listen_count
              FROM {events_table}
          GROUP BY to_char(date_trunc('{bucket}', listened_at), '{format}')
                 , CAST(date_part('epoch', date_trunc('{bucket}', listened_at)) AS BIGINT)
            "#
        )
    }

    fn combine_query(&self, full_table: &str, incremental_table: &str) -> String {
        format!(
            r#"
            WITH intermediate_table AS (
                SELECT time_range, segment, listen_count FROM {full_table}
                 UNION ALL
                SELECT time_range, segment, listen_count FROM {incremental_table}
            )
            SELECT time_range
                 , segment
                 , CAST(sum(listen_count) AS BIGINT) AS listen_count
              FROM intermediate_table
          GROUP BY time_range, segment
            "#
        )
    }

    fn top_n_query(&self, combined_table: &str, n: u32, _cache_tables: &[String]) -> String {
        format!(
            r#"
            WITH chronological AS (
                SELECT time_range
                     , segment
                     , listen_count
                  FROM {combined_table}
              ORDER BY segment ASC
                 LIMIT {n}
            )
            SELECT array_agg(
                       named_struct(
                           'time_range', time_range
                         , 'listen_count', listen_count
                       )
                       ORDER BY segment ASC
                   ) AS listening_activity
              FROM chronological
            "#
        )
    }
}
