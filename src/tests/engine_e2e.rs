//! End-to-end engine tests.
//!
//! Each test seeds Parquet event dumps under a temporary base path, runs the
//! engine through a real `SessionContext`, and inspects the ranked rows plus
//! the artifacts left on disk (bookkeeping record, persisted aggregate).

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::SessionContext;
use serde_json::{Value, json};

use crate::config::PlayrankConfig;
use crate::engine::IncrementalStatsEngine;
use crate::events::ParquetEventSource;
use crate::messages;
use crate::models::{BookkeepingRecord, DateRange, Entity, Scope, StatsKey, StatsRange};
use crate::providers::test_util::{country_batch, listen_batch, sorted_by};
use crate::providers::{
    SitewideArtistStats, SitewideListeningActivity, UserArtistStats,
};
use crate::storage::{LocalStorageClient, StorageClient};

struct StatsHarness {
    _dir: tempfile::TempDir,
    base: String,
    ctx: SessionContext,
    storage: Arc<dyn StorageClient>,
    engine: IncrementalStatsEngine,
}

impl StatsHarness {
    async fn new(top_entity_limit: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().display().to_string();

        let config = PlayrankConfig::from_toml(&format!(
            r#"
            [storage]
            base_path = "{base}"

            [stats]
            top_entity_limit = {top_entity_limit}
            "#
        ))
        .unwrap();

        let ctx = SessionContext::new();
        let storage: Arc<dyn StorageClient> = Arc::new(LocalStorageClient::new());
        let events = Arc::new(ParquetEventSource::new(
            ctx.clone(),
            storage.clone(),
            config.events.resolved_listens_path(&base),
            config.events.resolved_incremental_path(&base),
        ));
        let engine = IncrementalStatsEngine::new(ctx.clone(), storage.clone(), events, &config);

        Self {
            _dir: dir,
            base,
            ctx,
            storage,
            engine,
        }
    }

    async fn write_parquet(&self, path: &str, batch: RecordBatch) {
        std::fs::create_dir_all(path).unwrap();
        self.ctx
            .read_batch(batch)
            .unwrap()
            .write_parquet(path, DataFrameWriteOptions::new(), None)
            .await
            .unwrap();
    }

    async fn seed_listens(&self, rows: &[(i64, i64, &str, Option<&str>)]) {
        self.write_parquet(&format!("{}/listens", self.base), listen_batch(rows))
            .await;
    }

    async fn seed_incremental(&self, rows: &[(i64, i64, &str, Option<&str>)]) {
        self.write_parquet(
            &format!("{}/incremental/listens", self.base),
            listen_batch(rows),
        )
        .await;
    }

    async fn seed_artist_countries(&self, rows: &[(&str, &str)]) {
        self.write_parquet(
            &format!("{}/metadata/artist_country", self.base),
            country_batch(rows),
        )
        .await;
    }

    async fn bookkeeping_raw(&self, key: &StatsKey) -> Option<String> {
        self.storage
            .read_to_string(&key.bookkeeping_path(&self.base))
            .await
            .ok()
    }

    async fn run(
        &self,
        provider: &dyn crate::providers::StatsQueryProvider,
        range: &DateRange,
    ) -> Vec<Value> {
        let stats = self
            .engine
            .generate_stats(provider, StatsRange::Week, range)
            .await
            .unwrap();
        messages::collect_rows(stats).await.unwrap()
    }
}

fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .unwrap()
        .timestamp_millis()
}

fn week_range() -> DateRange {
    DateRange::new(utc(2024, 1, 1), utc(2024, 1, 8))
}

#[tokio::test]
async fn user_scenario_merges_incremental_and_ranks_top_one() {
    let harness = StatsHarness::new(1).await;

    // Full range: user 1 listened to A five times and B three times.
    harness
        .seed_listens(&[
            (ms(2024, 1, 2, 1), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 2, 2), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 2, 3), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 3, 1), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 3, 2), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 4, 1), 1, "B", Some("b-mbid")),
            (ms(2024, 1, 4, 2), 1, "B", Some("b-mbid")),
            (ms(2024, 1, 4, 3), 1, "B", Some("b-mbid")),
        ])
        .await;
    // Incremental: two more listens of A.
    harness
        .seed_incremental(&[
            (ms(2024, 1, 8, 1), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 8, 2), 1, "A", Some("a-mbid")),
        ])
        .await;
    harness
        .seed_artist_countries(&[("a-mbid", "US"), ("b-mbid", "DE")])
        .await;

    let rows = harness.run(&UserArtistStats, &week_range()).await;

    // Combined counts are A=7, B=3; with a limit of one only A survives.
    assert_eq!(
        rows,
        vec![json!({"user_id": 1, "artists": [
            {"listen_count": 7, "artist_name": "A", "artist_mbid": "a-mbid", "country_code": "US"},
        ]})]
    );
}

#[tokio::test]
async fn matching_from_date_reuses_the_persisted_aggregate() {
    let harness = StatsHarness::new(10).await;
    harness
        .seed_listens(&[
            (ms(2024, 1, 2, 1), 1, "A", None),
            (ms(2024, 1, 2, 2), 2, "B", None),
        ])
        .await;

    let key = StatsKey::new(Entity::Artists, Scope::Sitewide, StatsRange::Week);

    let first_rows = harness.run(&SitewideArtistStats, &week_range()).await;
    let first_record = harness.bookkeeping_raw(&key).await.unwrap();

    let second_rows = harness.run(&SitewideArtistStats, &week_range()).await;
    let second_record = harness.bookkeeping_raw(&key).await.unwrap();

    // No rebuild: the record (including `created`) is untouched.
    assert_eq!(first_record, second_record);
    assert_eq!(first_rows, second_rows);
}

#[tokio::test]
async fn changed_from_date_triggers_a_rebuild() {
    let harness = StatsHarness::new(10).await;
    harness
        .seed_listens(&[(ms(2024, 1, 2, 1), 1, "A", None)])
        .await;

    let key = StatsKey::new(Entity::Artists, Scope::Sitewide, StatsRange::Week);

    let rows = harness.run(&SitewideArtistStats, &week_range()).await;
    assert_eq!(rows, vec![json!({"artist_name": "A", "listen_count": 1})]);

    // Next week's run requests a different window; the stored aggregate no
    // longer matches and gets rebuilt from that window's events (none).
    let next_week = DateRange::new(utc(2024, 1, 8), utc(2024, 1, 15));
    let rows = harness.run(&SitewideArtistStats, &next_week).await;
    assert!(rows.is_empty());

    let record: BookkeepingRecord =
        serde_json::from_str(&harness.bookkeeping_raw(&key).await.unwrap()).unwrap();
    assert_eq!(record.from_date, utc(2024, 1, 8));
    assert_eq!(record.to_date, utc(2024, 1, 15));
}

#[tokio::test]
async fn missing_incremental_leaves_the_full_aggregate_unchanged() {
    let harness = StatsHarness::new(10).await;
    harness
        .seed_listens(&[
            (ms(2024, 1, 2, 1), 1, "A", None),
            (ms(2024, 1, 2, 2), 1, "A", None),
            (ms(2024, 1, 3, 1), 2, "B", None),
        ])
        .await;

    let rows = harness.run(&SitewideArtistStats, &week_range()).await;

    assert_eq!(
        rows,
        vec![
            json!({"artist_name": "A", "listen_count": 2}),
            json!({"artist_name": "B", "listen_count": 1}),
        ]
    );
}

#[tokio::test]
async fn top_n_keeps_only_the_highest_measures_in_order() {
    let harness = StatsHarness::new(3).await;

    // Five artists with listen counts 10, 8, 6, 4, 2 across distinct users.
    let mut listens = Vec::new();
    for (artist, count) in [("A", 10i64), ("B", 8), ("C", 6), ("D", 4), ("E", 2)] {
        for i in 0..count {
            listens.push((ms(2024, 1, 2, 0) + i * 60_000, i % 3, artist, None));
        }
    }
    harness.seed_listens(&listens).await;

    let rows = harness.run(&SitewideArtistStats, &week_range()).await;

    assert_eq!(
        rows,
        vec![
            json!({"artist_name": "A", "listen_count": 10}),
            json!({"artist_name": "B", "listen_count": 8}),
            json!({"artist_name": "C", "listen_count": 6}),
        ]
    );
}

#[tokio::test]
async fn per_user_rankings_are_isolated() {
    let harness = StatsHarness::new(1).await;
    harness
        .seed_listens(&[
            (ms(2024, 1, 2, 1), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 2, 2), 1, "A", Some("a-mbid")),
            (ms(2024, 1, 2, 3), 1, "B", Some("b-mbid")),
            // User 2 hammers C; this must not affect user 1's chart.
            (ms(2024, 1, 3, 1), 2, "C", Some("c-mbid")),
            (ms(2024, 1, 3, 2), 2, "C", Some("c-mbid")),
            (ms(2024, 1, 3, 3), 2, "C", Some("c-mbid")),
            (ms(2024, 1, 3, 4), 2, "C", Some("c-mbid")),
        ])
        .await;
    harness
        .seed_artist_countries(&[("a-mbid", "US"), ("b-mbid", "DE"), ("c-mbid", "SE")])
        .await;

    let rows = harness.run(&UserArtistStats, &week_range()).await;

    assert_eq!(
        sorted_by(rows, "user_id"),
        vec![
            json!({"user_id": 1, "artists": [
                {"listen_count": 2, "artist_name": "A", "artist_mbid": "a-mbid", "country_code": "US"},
            ]}),
            json!({"user_id": 2, "artists": [
                {"listen_count": 4, "artist_name": "C", "artist_mbid": "c-mbid", "country_code": "SE"},
            ]}),
        ]
    );
}

#[tokio::test]
async fn rebuilds_with_identical_inputs_are_idempotent() {
    let harness = StatsHarness::new(10).await;
    harness
        .seed_listens(&[
            (ms(2024, 1, 2, 1), 1, "A", None),
            (ms(2024, 1, 2, 2), 1, "B", None),
        ])
        .await;

    let key = StatsKey::new(Entity::Artists, Scope::Sitewide, StatsRange::Week);

    let first_rows = harness.run(&SitewideArtistStats, &week_range()).await;
    let first_record: BookkeepingRecord =
        serde_json::from_str(&harness.bookkeeping_raw(&key).await.unwrap()).unwrap();

    // Dropping the record forces a rebuild from the same inputs.
    harness
        .storage
        .remove_all(&key.bookkeeping_path(&harness.base))
        .await
        .unwrap();

    let second_rows = harness.run(&SitewideArtistStats, &week_range()).await;
    let second_record: BookkeepingRecord =
        serde_json::from_str(&harness.bookkeeping_raw(&key).await.unwrap()).unwrap();

    assert_eq!(first_rows, second_rows);
    assert_eq!(first_record.from_date, second_record.from_date);
    assert_eq!(first_record.to_date, second_record.to_date);
}

#[tokio::test]
async fn listening_activity_message_carries_the_histogram() {
    let harness = StatsHarness::new(1000).await;
    harness
        .seed_listens(&[
            (ms(2024, 1, 1, 10), 1, "A", None),
            (ms(2024, 1, 1, 11), 2, "B", None),
            (ms(2024, 1, 2, 9), 1, "A", None),
        ])
        .await;

    let provider = SitewideListeningActivity::new(StatsRange::Week);
    let stats = harness
        .engine
        .generate_stats(&provider, StatsRange::Week, &week_range())
        .await
        .unwrap();

    let message = messages::sitewide_listening_activity_message(stats, "week")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(message.message_type, "sitewide_listening_activity");
    assert_eq!(message.stats_range, "week");
    assert_eq!(message.from_ts, utc(2024, 1, 1).timestamp());
    assert_eq!(message.to_ts, utc(2024, 1, 8).timestamp());
    assert_eq!(
        message.data,
        json!([
            {"time_range": "01 January 2024", "listen_count": 2},
            {"time_range": "02 January 2024", "listen_count": 1},
        ])
    );
}
