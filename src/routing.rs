//! Picks the narrowest price-history route for a date range.
//!
//! Each fixed route is served from a pre-aggregated source, so a one-week
//! query against the year route pays for a year of data. Selection depends
//! only on the two dates passed in.

use std::time::Duration;

use time::Date;

pub const PAST_DAY_PATH: &str = "/v1/prices/past_day";
pub const PAST_WEEK_PATH: &str = "/v1/prices/past_week";
pub const PAST_MONTH_PATH: &str = "/v1/prices/past_month";
pub const PAST_YEAR_PATH: &str = "/v1/prices/past_year";
pub const RANGE_PATH: &str = "/v1/prices/historical";

/// Lower bound of the range route's timeout.
pub const RANGE_TIMEOUT_FLOOR: Duration = Duration::from_secs(120);
/// Upper bound of the range route's timeout.
pub const RANGE_TIMEOUT_CEILING: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
    /// Spans longer than a year.
    Range,
}

/// Backend route chosen for one historical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointRoute {
    pub granularity: Granularity,
    pub path: &'static str,
    /// Per-attempt timeout used unless the caller overrides it.
    pub timeout: Duration,
}

impl EndpointRoute {
    const fn fixed(granularity: Granularity, path: &'static str, secs: u64) -> Self {
        Self {
            granularity,
            path,
            timeout: Duration::from_secs(secs),
        }
    }
}

/// Selects the route for `start..=end`.
///
/// Buckets are inclusive at the smaller end: a span of exactly 7 days uses
/// the week route. An `end` before `start` counts as a zero-day span.
pub fn select_route(start: Date, end: Date) -> EndpointRoute {
    let days = (end - start).whole_days().max(0);
    match days {
        0..=1 => EndpointRoute::fixed(Granularity::Day, PAST_DAY_PATH, 10),
        2..=7 => EndpointRoute::fixed(Granularity::Week, PAST_WEEK_PATH, 30),
        8..=30 => EndpointRoute::fixed(Granularity::Month, PAST_MONTH_PATH, 60),
        31..=365 => EndpointRoute::fixed(Granularity::Year, PAST_YEAR_PATH, 120),
        _ => EndpointRoute {
            granularity: Granularity::Range,
            path: RANGE_PATH,
            timeout: range_timeout(days),
        },
    }
}

/// Route used when the query has no complete date range.
pub fn unbounded_route() -> EndpointRoute {
    EndpointRoute::fixed(Granularity::Year, PAST_YEAR_PATH, 120)
}

/// 120s per year of span, rounded up to whole seconds and clamped to
/// [`RANGE_TIMEOUT_FLOOR`, `RANGE_TIMEOUT_CEILING`].
fn range_timeout(days: i64) -> Duration {
    let days = u64::try_from(days).unwrap_or(0);
    let secs = days.saturating_mul(120).div_ceil(365);
    Duration::from_secs(secs).clamp(RANGE_TIMEOUT_FLOOR, RANGE_TIMEOUT_CEILING)
}
