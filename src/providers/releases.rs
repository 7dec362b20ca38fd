//! Release statistics.

use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use super::{StatsQueryProvider, capped_listen_count};
use crate::models::{Entity, Scope};

/// Sitewide top releases.
///
/// Merge law: additive. Listen counts sum per
/// (release_name, release_mbid, artist_name).
pub struct SitewideReleaseStats;

impl StatsQueryProvider for SitewideReleaseStats {
    fn entity(&self) -> Entity {
        Entity::Releases
    }

    fn scope(&self) -> Scope {
        Scope::Sitewide
    }

    fn partial_aggregate_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("release_name", DataType::Utf8, true),
            Field::new("release_mbid", DataType::Utf8, true),
            Field::new("artist_name", DataType::Utf8, true),
            Field::new("listen_count", DataType::Int64, true),
        ]))
    }

    fn aggregate_query(
        &self,
        events_table: &str,
        _cache_tables: &[String],
        listen_count_limit: Option<i64>,
    ) -> String {
        let listen_count = capped_listen_count(listen_count_limit);
        // Listens without release metadata carry nothing to chart.
        format!(
            r#"
            WITH user_counts AS (
                SELECT user_id
                     , release_name
                     , release_mbid
                     , artist_name
                     , {listen_count} AS listen_count
                  FROM {events_table}
                 WHERE release_name IS NOT NULL
              GROUP BY user_id, release_name, release_mbid, artist_name
            )
            SELECT release_name
                 , release_mbid
                 , artist_name
                 , CAST(sum(listen_count) AS BIGINT) AS listen_count
              FROM user_counts
          GROUP BY release_name, release_mbid, artist_name
            "#
        )
    }

    fn combine_query(&self, full_table: &str, incremental_table: &str) -> String {
        format!(
            r#"
            WITH intermediate_table AS (
                SELECT release_name, release_mbid, artist_name, listen_count FROM {full_table}
                 UNION ALL
                SELECT release_name, release_mbid, artist_name, listen_count FROM {incremental_table}
            )
            SELECT release_name
                 , release_mbid
                 , artist_name
                 , CAST(sum(listen_count) AS BIGINT) AS listen_count
              FROM intermediate_table
          GROUP BY release_name, release_mbid, artist_name
            "#
        )
    }

    fn top_n_query(&self, combined_table: &str, n: u32, _cache_tables: &[String]) -> String {
        format!(
            r#"
            WITH ranked_stats AS (
                SELECT release_name
                     , release_mbid
                     , artist_name
                     , listen_count
                     , row_number() OVER (ORDER BY listen_count DESC) AS row_num
                  FROM {combined_table}
            )
            SELECT release_name
                 , release_mbid
                 , artist_name
                 , listen_count
              FROM ranked_stats
             WHERE row_num <= {n}
          ORDER BY listen_count DESC
            "#
        )
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::{Int64Array, StringArray};
    use datafusion::arrow::record_batch::RecordBatch;
    use serde_json::json;

    use super::super::test_util::{run_query, sorted_by};
    use super::*;

    fn release_aggregate(
        schema: &SchemaRef,
        rows: &[(&str, Option<&str>, &str, i64)],
    ) -> RecordBatch {
        RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(rows.iter().map(|r| r.0).collect::<Vec<_>>())),
                Arc::new(StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
                Arc::new(StringArray::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
                Arc::new(Int64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn combine_sums_per_release() {
        let provider = SitewideReleaseStats;
        let schema = provider.partial_aggregate_schema();
        let full = release_aggregate(&schema, &[("R1", Some("r1"), "A", 4)]);
        let incremental = release_aggregate(
            &schema,
            &[("R1", Some("r1"), "A", 2), ("R2", None, "B", 1)],
        );

        let sql = provider.combine_query("full_agg", "inc_agg");
        let rows = run_query(vec![("full_agg", full), ("inc_agg", incremental)], &sql).await;

        assert_eq!(
            sorted_by(rows, "release_name"),
            vec![
                json!({"release_name": "R1", "release_mbid": "r1", "artist_name": "A", "listen_count": 6}),
                json!({"release_name": "R2", "artist_name": "B", "listen_count": 1}),
            ]
        );
    }

    #[tokio::test]
    async fn top_n_is_a_descending_prefix() {
        let provider = SitewideReleaseStats;
        let schema = provider.partial_aggregate_schema();
        let combined = release_aggregate(
            &schema,
            &[
                ("R1", None, "A", 10),
                ("R2", None, "B", 30),
                ("R3", None, "C", 20),
            ],
        );

        let sql = provider.top_n_query("combined", 2, &[]);
        let rows = run_query(vec![("combined", combined)], &sql).await;

        assert_eq!(
            rows,
            vec![
                json!({"release_name": "R2", "artist_name": "B", "listen_count": 30}),
                json!({"release_name": "R3", "artist_name": "C", "listen_count": 20}),
            ]
        );
    }
}
