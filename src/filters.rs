//! Active query constraints and the per-endpoint parameter table.
//!
//! A [`FilterState`] is a plain value: it is replaced wholesale by the
//! dashboard and handed to every load by copy, so in-flight requests always
//! carry the filters that were active when they were issued.

use std::fmt;

use chrono::Weekday;

use crate::config::QueryConfig;

/// Query parameter names understood by the analytics backend.
pub const DAY_PARAM: &str = "day_of_week";
pub const HOUR_START_PARAM: &str = "hour_start";
pub const HOUR_END_PARAM: &str = "hour_end";

/// Currently active constraints. `None` means unconstrained.
///
/// `hour_start <= hour_end` is not enforced; the backend decides what an
/// inverted range means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterState {
    pub day_of_week: Option<Weekday>,
    pub hour_start: Option<u8>,
    pub hour_end: Option<u8>,
}

impl FilterState {
    pub fn new(day_of_week: Option<Weekday>, hour_start: Option<u8>, hour_end: Option<u8>) -> Self {
        Self {
            day_of_week,
            hour_start,
            hour_end,
        }
    }

    /// The all-unconstrained state used at startup and after a reset.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::unconstrained()
    }

    /// Backend encoding of the day: 0 = Monday .. 6 = Sunday.
    pub fn day_index(&self) -> Option<u32> {
        self.day_of_week.map(|d| d.num_days_from_monday())
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = self
            .day_of_week
            .map_or_else(|| "any day".to_string(), |d| d.to_string());
        let hour = |h: Option<u8>| h.map_or_else(|| "*".to_string(), |h| format!("{h}:00"));
        write!(f, "{day}, {}-{}", hour(self.hour_start), hour(self.hour_end))
    }
}

/// Ordered query string pairs. Absent values are never recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }

    pub fn with_opt<T: fmt::Display>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Which filter fields an endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FilterFields {
    day: bool,
    hours: bool,
}

const DAY_ONLY: FilterFields = FilterFields {
    day: true,
    hours: false,
};
const HOURS_ONLY: FilterFields = FilterFields {
    day: false,
    hours: true,
};
const DAY_AND_HOURS: FilterFields = FilterFields {
    day: true,
    hours: true,
};

/// The analytics endpoints the dashboard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    SummaryOverview,
    BusiestHour,
    HourlyDistribution,
    HourlyPickups,
    DailyPatterns,
    PickupClusters,
    ClusterRanking,
    TopFlows,
    TripSorting,
}

impl Endpoint {
    pub const ALL: [Endpoint; 9] = [
        Endpoint::SummaryOverview,
        Endpoint::BusiestHour,
        Endpoint::HourlyDistribution,
        Endpoint::HourlyPickups,
        Endpoint::DailyPatterns,
        Endpoint::PickupClusters,
        Endpoint::ClusterRanking,
        Endpoint::TopFlows,
        Endpoint::TripSorting,
    ];

    /// Path relative to the API base.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::SummaryOverview => "summary/overview",
            Endpoint::BusiestHour => "summary/busiest-hour",
            Endpoint::HourlyDistribution => "temporal/hourly-distribution",
            Endpoint::HourlyPickups => "custom/hourly-pickups",
            Endpoint::DailyPatterns => "temporal/daily-patterns",
            Endpoint::PickupClusters => "clusters/pickup",
            Endpoint::ClusterRanking => "custom/cluster-ranking",
            Endpoint::TopFlows => "flows/top-pairs",
            Endpoint::TripSorting => "custom/trip-sorting",
        }
    }

    fn filter_fields(&self) -> FilterFields {
        match self {
            Endpoint::SummaryOverview | Endpoint::PickupClusters | Endpoint::TopFlows => {
                DAY_AND_HOURS
            }
            Endpoint::BusiestHour
            | Endpoint::HourlyDistribution
            | Endpoint::HourlyPickups
            | Endpoint::ClusterRanking
            | Endpoint::TripSorting => DAY_ONLY,
            Endpoint::DailyPatterns => HOURS_ONLY,
        }
    }

    /// Fixed parameters first, then whichever filter fields are set.
    pub fn params(&self, filters: &FilterState, queries: &QueryConfig) -> QueryParams {
        let fixed = match self {
            Endpoint::PickupClusters => QueryParams::new().with("n_clusters", queries.pickup_clusters),
            Endpoint::ClusterRanking => QueryParams::new()
                .with("n_clusters", queries.ranked_clusters)
                .with("cluster_type", "pickup"),
            Endpoint::TopFlows => QueryParams::new().with("limit", queries.flow_limit),
            Endpoint::TripSorting => QueryParams::new()
                .with("sort_by", "duration")
                .with("order", "desc")
                .with("limit", queries.trip_limit),
            _ => QueryParams::new(),
        };

        let fields = self.filter_fields();
        let mut params = fixed;
        if fields.day {
            params = params.with_opt(DAY_PARAM, filters.day_index());
        }
        if fields.hours {
            params = params
                .with_opt(HOUR_START_PARAM, filters.hour_start)
                .with_opt(HOUR_END_PARAM, filters.hour_end);
        }
        params
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
