//! Artist statistics.
//!
//! Two variants share the artist grouping key (name + optional MBID): the
//! sitewide chart ranks artists across all users, the user chart ranks each
//! user's own artists and enriches every ranked row with the artist's
//! country code from the artist-country lookup dataset.

use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use super::{StatsQueryProvider, capped_listen_count};
use crate::models::{Entity, Scope};

/// Relative path of the artist→country lookup dataset
/// (columns: artist_mbid, country_code).
pub const ARTIST_COUNTRY_CACHE: &str = "metadata/artist_country";

/// Sitewide top artists.
///
/// Merge law: additive. Listen counts sum per (artist_name, artist_mbid).
pub struct SitewideArtistStats;

impl StatsQueryProvider for SitewideArtistStats {
    fn entity(&self) -> Entity {
        Entity::Artists
    }

    fn scope(&self) -> Scope {
        Scope::Sitewide
    }

    fn partial_aggregate_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("artist_name", DataType::Utf8, true),
            Field::new("artist_mbid", DataType::Utf8, true),
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
        format!(
            r#"
            WITH user_counts AS (
                SELECT user_id
                     , artist_name
                     , artist_mbid
                     , {listen_count} AS listen_count
                  FROM {events_table}
              GROUP BY user_id, artist_name, artist_mbid
            )
            SELECT artist_name
                 , artist_mbid
                 , CAST(sum(listen_count) AS BIGINT) AS listen_count
              FROM user_counts
          GROUP BY artist_name, artist_mbid
            "#
        )
    }

    fn combine_query(&self, full_table: &str, incremental_table: &str) -> String {
        format!(
            r#"
            WITH intermediate_table AS (
                SELECT artist_name, artist_mbid, listen_count FROM {full_table}
                 UNION ALL
                SELECT artist_name, artist_mbid, listen_count FROM {incremental_table}
            )
            SELECT artist_name
                 , artist_mbid
                 , CAST(sum(listen_count) AS BIGINT) AS listen_count
              FROM intermediate_table
          GROUP BY artist_name, artist_mbid
            "#
        )
    }

    fn top_n_query(&self, combined_table: &str, n: u32, _cache_tables: &[String]) -> String {
        format!(
            r#"
            WITH ranked_stats AS (
                SELECT artist_name
                     , artist_mbid
                     , listen_count
                     , row_number() OVER (ORDER BY listen_count DESC) AS row_num
                  FROM {combined_table}
            )
            SELECT artist_name
                 , artist_mbid
                 , listen_count
              FROM ranked_stats
             WHERE row_num <= {n}
          ORDER BY listen_count DESC
            "#
        )
    }
}

/// Per-user top artists, enriched with each artist's country code.
///
/// Merge law: additive. Listen counts sum per
/// (user_id, artist_name, artist_mbid). The ranking join is an inner join on
/// the country lookup, so artists without a mapped MBID drop out of the
/// ranked arrays.
pub struct UserArtistStats;

impl StatsQueryProvider for UserArtistStats {
    fn entity(&self) -> Entity {
        Entity::Artists
    }

    fn scope(&self) -> Scope {
        Scope::User
    }

    fn partial_aggregate_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Int64, true),
            Field::new("artist_name", DataType::Utf8, true),
            Field::new("artist_mbid", DataType::Utf8, true),
            Field::new("listen_count", DataType::Int64, true),
        ]))
    }

    fn cache_tables(&self) -> Vec<String> {
        vec![ARTIST_COUNTRY_CACHE.to_string()]
    }

    fn aggregate_query(
        &self,
        events_table: &str,
        _cache_tables: &[String],
        _listen_count_limit: Option<i64>,
    ) -> String {
        // No cap: a user's own chart reflects everything they listened to.
        format!(
            r#"
            SELECT user_id
                 , artist_name
                 , artist_mbid
                 , count(*) AS listen_count
              FROM {events_table}
          GROUP BY user_id, artist_name, artist_mbid
            "#
        )
    }

    fn combine_query(&self, full_table: &str, incremental_table: &str) -> String {
        format!(
            r#"
            WITH intermediate_table AS (
                SELECT user_id, artist_name, artist_mbid, listen_count FROM {full_table}
                 UNION ALL
                SELECT user_id, artist_name, artist_mbid, listen_count FROM {incremental_table}
            )
            SELECT user_id
                 , artist_name
                 , artist_mbid
                 , CAST(sum(listen_count) AS BIGINT) AS listen_count
              FROM intermediate_table
          GROUP BY user_id, artist_name, artist_mbid
            "#
        )
    }

    fn top_n_query(&self, combined_table: &str, n: u32, cache_tables: &[String]) -> String {
        let country_lookup = &cache_tables[0];
        format!(
            r#"
            WITH ranked_stats AS (
                SELECT user_id
                     , artist_name
                     , artist_mbid
                     , listen_count
                     , row_number() OVER (PARTITION BY user_id ORDER BY listen_count DESC) AS row_num
                  FROM {combined_table}
            )
            SELECT user_id
                 , array_agg(
                       named_struct(
                           'listen_count', listen_count
                         , 'artist_name', artist_name
                         , 'artist_mbid', artist_mbid
                         , 'country_code', country_code
                       )
                       ORDER BY listen_count DESC
                   ) AS artists
              FROM ranked_stats
              JOIN {country_lookup}
             USING (artist_mbid)
             WHERE row_num <= {n}
          GROUP BY user_id
            "#
        )
    }
}
