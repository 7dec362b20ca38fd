//! Core identifiers and records shared across the stats pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity axis of a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Artists,
    Releases,
    ListeningActivity,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Artists => "artists",
            Entity::Releases => "releases",
            Entity::ListeningActivity => "listening_activity",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artists" => Ok(Entity::Artists),
            "releases" => Ok(Entity::Releases),
            "listening_activity" => Ok(Entity::ListeningActivity),
            other => Err(format!(
                "unknown entity '{other}', expected one of: artists, releases, listening_activity"
            )),
        }
    }
}

/// Whether a statistic is aggregated across all users or per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Sitewide,
    User,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Sitewide => "sitewide",
            Scope::User => "user",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sitewide" => Ok(Scope::Sitewide),
            "user" => Ok(Scope::User),
            other => Err(format!(
                "unknown scope '{other}', expected one of: sitewide, user"
            )),
        }
    }
}

/// Named time window a statistic is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsRange {
    Week,
    Month,
    Year,
    AllTime,
}

impl StatsRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsRange::Week => "week",
            StatsRange::Month => "month",
            StatsRange::Year => "year",
            StatsRange::AllTime => "all_time",
        }
    }
}

impl fmt::Display for StatsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(StatsRange::Week),
            "month" => Ok(StatsRange::Month),
            "year" => Ok(StatsRange::Year),
            "all_time" => Ok(StatsRange::AllTime),
            other => Err(format!(
                "unknown stats range '{other}', expected one of: week, month, year, all_time"
            )),
        }
    }
}

/// Half-open `[from_date, to_date)` window a statistic covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
}

impl DateRange {
    /// Invariant: `from_date < to_date`.
    pub fn new(from_date: DateTime<Utc>, to_date: DateTime<Utc>) -> Self {
        debug_assert!(from_date < to_date, "date range must not be empty");
        Self { from_date, to_date }
    }

    /// Start of the window as epoch seconds.
    pub fn from_ts(&self) -> i64 {
        self.from_date.timestamp()
    }

    /// End of the window as epoch seconds.
    pub fn to_ts(&self) -> i64 {
        self.to_date.timestamp()
    }
}

/// Identifies every persisted artifact belonging to one statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatsKey {
    pub entity: Entity,
    pub scope: Scope,
    pub range: StatsRange,
}

impl StatsKey {
    pub fn new(entity: Entity, scope: Scope, range: StatsRange) -> Self {
        Self {
            entity,
            scope,
            range,
        }
    }

    /// Name prefix for the intermediate datasets registered during one run.
    pub fn table_prefix(&self) -> String {
        format!("{}_{}_{}", self.scope, self.entity, self.range)
    }

    /// Directory holding the persisted full aggregate for this key.
    pub fn aggregate_path(&self, base: &str) -> String {
        format!(
            "{}/aggregates/{}/{}/{}",
            base.trim_end_matches('/'),
            self.scope,
            self.entity,
            self.range
        )
    }

    /// Path of the bookkeeping record for this key.
    pub fn bookkeeping_path(&self, base: &str) -> String {
        format!(
            "{}/bookkeeping/{}/{}/{}.json",
            base.trim_end_matches('/'),
            self.scope,
            self.entity,
            self.range
        )
    }
}

impl fmt::Display for StatsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.scope, self.entity, self.range)
    }
}

/// Coverage metadata for the persisted full aggregate of one [`StatsKey`].
///
/// The full aggregate on disk was built from events in
/// `[from_date, to_date)` at time `created`. Overwritten on every rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookkeepingRecord {
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_round_trips_through_str() {
        for entity in [Entity::Artists, Entity::Releases, Entity::ListeningActivity] {
            assert_eq!(entity.as_str().parse::<Entity>().unwrap(), entity);
        }
        assert!("playlists".parse::<Entity>().is_err());
    }

    #[test]
    fn range_round_trips_through_str() {
        for range in [
            StatsRange::Week,
            StatsRange::Month,
            StatsRange::Year,
            StatsRange::AllTime,
        ] {
            assert_eq!(range.as_str().parse::<StatsRange>().unwrap(), range);
        }
        assert!("decade".parse::<StatsRange>().is_err());
    }

    #[test]
    fn key_derives_paths_and_prefix() {
        let key = StatsKey::new(Entity::Artists, Scope::Sitewide, StatsRange::Week);
        assert_eq!(key.table_prefix(), "sitewide_artists_week");
        assert_eq!(
            key.aggregate_path("/data/"),
            "/data/aggregates/sitewide/artists/week"
        );
        assert_eq!(
            key.bookkeeping_path("/data"),
            "/data/bookkeeping/sitewide/artists/week.json"
        );
    }

    #[test]
    fn bookkeeping_record_serializes_timestamps_as_rfc3339() {
        use chrono::TimeZone;

        let record = BookkeepingRecord {
            from_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            to_date: Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
            created: Utc.with_ymd_and_hms(2024, 1, 8, 3, 30, 0).unwrap(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("2024-01-01T00:00:00Z"));

        let parsed: BookkeepingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
