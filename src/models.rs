//! Response bodies of the analytics API and the map-facing types derived
//! from them.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// `summary/overview`. Every metric may be missing or null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SummaryOverview {
    #[serde(default)]
    pub total_trips: Option<u64>,
    #[serde(default)]
    pub avg_duration_minutes: Option<f64>,
    #[serde(default)]
    pub avg_distance_km: Option<f64>,
    #[serde(default)]
    pub avg_speed_km_h: Option<f64>,
    #[serde(default)]
    pub avg_passengers: Option<f64>,
}

/// `summary/busiest-hour`. The backend sends `busiest_hour: null` when there
/// are no trips for the filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BusiestHour {
    pub busiest_hour: Option<u32>,
    #[serde(default)]
    pub trip_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyCount {
    pub hour: i64,
    pub trip_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyDistribution {
    pub hourly_distribution: Vec<HourlyCount>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DayCount {
    pub day_name: String,
    pub trip_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyPatterns {
    pub daily_patterns: Vec<DayCount>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCluster {
    pub cluster_id: i64,
    pub center_lat: f64,
    pub center_lon: f64,
    pub point_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PickupClusters {
    pub clusters: Vec<RawCluster>,
}

impl PickupClusters {
    pub fn into_points(self) -> Vec<ClusterPoint> {
        self.clusters.into_iter().map(ClusterPoint::from).collect()
    }
}

/// A clustered pickup hotspot as drawn on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    pub cluster_id: i64,
    pub center: LatLon,
    pub trip_count: u64,
    /// The clustering endpoint carries no durations, so this stays `None`
    /// and the map popup shows `N/A`.
    pub avg_duration_minutes: Option<f64>,
}

impl From<RawCluster> for ClusterPoint {
    fn from(raw: RawCluster) -> Self {
        Self {
            cluster_id: raw.cluster_id,
            center: LatLon::new(raw.center_lat, raw.center_lon),
            trip_count: raw.point_count,
            avg_duration_minutes: None,
        }
    }
}

/// Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankedCluster {
    pub cluster_id: i64,
    pub center_lat: f64,
    pub center_lon: f64,
    pub trip_count: u64,
    pub avg_duration: f64,
    pub total_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterRanking {
    #[serde(default)]
    pub ranked_clusters: Vec<RankedCluster>,
}

/// One origin-destination pair from `flows/top-pairs`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowEdge {
    pub pickup: LatLon,
    pub dropoff: LatLon,
    pub trip_count: u64,
    #[serde(default)]
    pub avg_duration_minutes: Option<f64>,
    #[serde(default)]
    pub avg_distance_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopFlows {
    #[serde(default)]
    pub flows: Vec<FlowEdge>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SortedTrip {
    pub trip_duration_minutes: f64,
    pub trip_distance_km: f64,
    pub trip_speed_km_h: f64,
    pub pickup_location: LatLon,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SortedTrips {
    pub trips: Vec<SortedTrip>,
}

/// `custom/hourly-pickups`: hour (as a string key) to pickup count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyPickups {
    pub hourly_pickups: BTreeMap<String, u64>,
}

impl HourlyPickups {
    /// Entries with numeric keys, ascending by hour. Keys that are not
    /// integers are dropped.
    pub fn sorted(&self) -> Vec<(u32, u64)> {
        let mut hours: Vec<(u32, u64)> = self
            .hourly_pickups
            .iter()
            .filter_map(|(hour, count)| hour.trim().parse::<u32>().ok().map(|h| (h, *count)))
            .collect();
        hours.sort_by_key(|(hour, _)| *hour);
        hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parsing Tests ====================

    #[test]
    fn test_summary_with_nulls() {
        let body = r#"{"total_trips": 1200, "avg_duration_minutes": null, "avg_distance_km": 3.2}"#;
        let summary: SummaryOverview = serde_json::from_str(body).unwrap();
        assert_eq!(summary.total_trips, Some(1200));
        assert_eq!(summary.avg_duration_minutes, None);
        assert_eq!(summary.avg_distance_km, Some(3.2));
        assert_eq!(summary.avg_passengers, None);
    }

    #[test]
    fn test_busiest_hour_null() {
        let body = r#"{"busiest_hour": null, "trip_count": 0, "day_of_week": 3}"#;
        let busiest: BusiestHour = serde_json::from_str(body).unwrap();
        assert_eq!(busiest.busiest_hour, None);
    }

    #[test]
    fn test_cluster_conversion() {
        let body = r#"{"clusters": [{"cluster_id": 2, "center_lat": 40.75, "center_lon": -73.99,
            "point_count": 64, "points": []}], "total_clusters": 1}"#;
        let clusters: PickupClusters = serde_json::from_str(body).unwrap();
        let points = clusters.into_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].cluster_id, 2);
        assert_eq!(points[0].center, LatLon::new(40.75, -73.99));
        assert_eq!(points[0].trip_count, 64);
        assert_eq!(points[0].avg_duration_minutes, None);
    }

    #[test]
    fn test_clusters_field_is_required() {
        let result: Result<PickupClusters, _> = serde_json::from_str(r#"{"message": "nope"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_flow_optional_metrics() {
        let body = r#"{"flows": [{"pickup": {"lat": 40.7, "lon": -74.0},
            "dropoff": {"lat": 40.8, "lon": -73.9}, "trip_count": 1}]}"#;
        let flows: TopFlows = serde_json::from_str(body).unwrap();
        assert_eq!(flows.flows[0].avg_duration_minutes, None);
        assert_eq!(flows.flows[0].avg_distance_km, None);
    }

    #[test]
    fn test_hourly_pickups_sorted_numerically() {
        let body = r#"{"hourly_pickups": {"10": 5, "2": 7, "23": 1, "0": 9}}"#;
        let pickups: HourlyPickups = serde_json::from_str(body).unwrap();
        assert_eq!(pickups.sorted(), vec![(0, 9), (2, 7), (10, 5), (23, 1)]);
    }

    #[test]
    fn test_hourly_pickups_skips_non_numeric_keys() {
        let body = r#"{"hourly_pickups": {"total": 5, "4": 2}}"#;
        let pickups: HourlyPickups = serde_json::from_str(body).unwrap();
        assert_eq!(pickups.sorted(), vec![(4, 2)]);
    }
}
