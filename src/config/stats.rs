//! Ranking and capping knobs.

use serde::{Deserialize, Serialize};

use crate::models::StatsRange;

/// Ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
    /// Maximum number of ranked entities retained per scope unit (globally
    /// for sitewide statistics, per user otherwise).
    #[serde(default = "default_top_entity_limit")]
    pub top_entity_limit: u32,

    /// Per-user listen-count caps applied to sitewide aggregates.
    #[serde(default)]
    pub listen_count_limits: ListenCountLimits,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_entity_limit: default_top_entity_limit(),
            listen_count_limits: ListenCountLimits::default(),
        }
    }
}

/// Caps a single user's contribution per grouping key in sitewide
/// aggregates, so outlier and bot accounts cannot dominate the charts.
/// Per-user statistics never apply a cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenCountLimits {
    #[serde(default = "default_week_limit")]
    pub week: i64,

    #[serde(default = "default_month_limit")]
    pub month: i64,

    #[serde(default = "default_year_limit")]
    pub year: i64,

    #[serde(default = "default_all_time_limit")]
    pub all_time: i64,
}

impl Default for ListenCountLimits {
    fn default() -> Self {
        Self {
            week: default_week_limit(),
            month: default_month_limit(),
            year: default_year_limit(),
            all_time: default_all_time_limit(),
        }
    }
}

impl ListenCountLimits {
    /// Cap for one stats range.
    pub fn limit_for(&self, range: StatsRange) -> i64 {
        match range {
            StatsRange::Week => self.week,
            StatsRange::Month => self.month,
            StatsRange::Year => self.year,
            StatsRange::AllTime => self.all_time,
        }
    }
}

fn default_top_entity_limit() -> u32 {
    1000
}

fn default_week_limit() -> i64 {
    100
}

fn default_month_limit() -> i64 {
    300
}

fn default_year_limit() -> i64 {
    500
}

fn default_all_time_limit() -> i64 {
    1000
}
