//! Date-range selection for the supported stats ranges.
//!
//! Every range is resolved relative to "now" and always ends at a period
//! boundary, so two invocations on the same day request the same
//! `from_date`. That is what makes the bookkeeping freshness check (which
//! compares `from_date` only) safe: within one coverage window the start is
//! stable and everything past the persisted `to_date` arrives through the
//! incremental event source.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{DateRange, StatsRange};

/// Earliest listen the full-history dump can contain.
const ALL_TIME_START_YEAR: i32 = 2002;

/// Resolve a stats range to the concrete window it covers at `now`.
pub fn date_range_for(range: StatsRange, now: DateTime<Utc>) -> DateRange {
    let today = now.date_naive();

    let (from, to) = match range {
        StatsRange::Week => {
            let days_from_monday = today.weekday().num_days_from_monday() as i64;
            let this_monday = today - Duration::days(days_from_monday);
            (this_monday - Duration::days(7), this_monday)
        }
        StatsRange::Month => {
            let first_of_month = today.with_day(1).expect("day 1 exists in every month");
            let previous = if first_of_month.month() == 1 {
                NaiveDate::from_ymd_opt(first_of_month.year() - 1, 12, 1)
            } else {
                NaiveDate::from_ymd_opt(first_of_month.year(), first_of_month.month() - 1, 1)
            }
            .expect("first of previous month exists");
            (previous, first_of_month)
        }
        StatsRange::Year => {
            let jan_first =
                NaiveDate::from_ymd_opt(today.year(), 1, 1).expect("january 1st exists");
            let previous =
                NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).expect("january 1st exists");
            (previous, jan_first)
        }
        StatsRange::AllTime => {
            let epoch = NaiveDate::from_ymd_opt(ALL_TIME_START_YEAR, 1, 1)
                .expect("all-time epoch exists");
            (epoch, today)
        }
    };

    DateRange::new(midnight(from), midnight(to))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
