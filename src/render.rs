//! Render coordinator: turns a [`Snapshot`] into metric values, chart data
//! and panel rows, and pushes them into a [`DashboardSink`].
//!
//! Rendering is idempotent. Charts are rebuilt from scratch on every pass
//! and the previous instance of each chart is destroyed first, so the sink
//! never holds more than one live chart per kind.

use crate::{
    aggregator::{AnalyticsSections, ChartSections, Section, Snapshot},
    models::{
        BusiestHour, ClusterRanking, DailyPatterns, HourlyDistribution, HourlyPickups, SortedTrips,
        SummaryOverview,
    },
    traits::DashboardSink,
};

/// Placeholder shown for a metric with no value.
pub const DASH: &str = "--";

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

// ==================== Sink Vocabulary ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    TotalTrips,
    AvgDuration,
    AvgDistance,
    AvgSpeed,
    AvgPassengers,
    BusiestHour,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::TotalTrips,
        Metric::AvgDuration,
        Metric::AvgDistance,
        Metric::AvgSpeed,
        Metric::AvgPassengers,
        Metric::BusiestHour,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalTrips => "Total trips",
            Metric::AvgDuration => "Avg duration",
            Metric::AvgDistance => "Avg distance",
            Metric::AvgSpeed => "Avg speed",
            Metric::AvgPassengers => "Avg passengers",
            Metric::BusiestHour => "Busiest hour",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartKind {
    Hourly,
    Daily,
}

/// Opaque handle to a chart instance owned by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChartHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    pub x_title: Option<&'static str>,
    pub y_title: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Panel {
    ClusterRanking,
    TopTrips,
    HourlyPickups,
}

impl Panel {
    /// Name of the backend data feeding the panel, as shown to the user.
    pub fn source_label(&self) -> &'static str {
        match self {
            Panel::ClusterRanking => "cluster ranking",
            Panel::TopTrips => "trip sorting",
            Panel::HourlyPickups => "hourly pickups",
        }
    }

    pub fn unavailable_message(&self) -> String {
        format!("No data received from {} endpoint", self.source_label())
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            Panel::ClusterRanking => "No cluster ranking data available",
            Panel::TopTrips => "No trip data available",
            Panel::HourlyPickups => "No hourly pickup data available",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRow {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelContent {
    Rows(Vec<PanelRow>),
    NoData(String),
}

impl PanelContent {
    pub fn rows(&self) -> &[PanelRow] {
        match self {
            PanelContent::Rows(rows) => rows,
            PanelContent::NoData(_) => &[],
        }
    }
}

// ==================== Formatting ====================

/// 12-hour clock label without minutes: 0 -> "12AM", 17 -> "5PM".
pub fn format_hour_12h(hour: u32) -> String {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display}{period}")
}

pub fn format_coords(lat: f64, lon: f64) -> String {
    format!("{lat:.4}, {lon:.4}")
}

pub fn seconds_to_minutes(seconds: f64) -> f64 {
    seconds / 60.0
}

fn with_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => format!("{DASH} {unit}"),
    }
}

/// Formatted metric values; every metric falls back to its dash form.
pub fn summary_metrics(summary: Option<&SummaryOverview>) -> Vec<(Metric, String)> {
    let s = summary.cloned().unwrap_or_default();
    vec![
        (
            Metric::TotalTrips,
            s.total_trips.map_or_else(|| DASH.to_string(), |n| n.to_string()),
        ),
        (Metric::AvgDuration, with_unit(s.avg_duration_minutes, "min")),
        (Metric::AvgDistance, with_unit(s.avg_distance_km, "km")),
        (Metric::AvgSpeed, with_unit(s.avg_speed_km_h, "km/h")),
        (
            Metric::AvgPassengers,
            s.avg_passengers
                .map_or_else(|| DASH.to_string(), |p| format!("{p:.1}")),
        ),
    ]
}

pub fn busiest_hour_label(busiest: Option<&BusiestHour>) -> String {
    match busiest {
        Some(BusiestHour {
            busiest_hour: Some(hour),
            trip_count,
        }) => format!("{} ({} trips)", format_hour_12h(*hour), trip_count),
        _ => DASH.to_string(),
    }
}

/// Trip counts indexed by hour of day. Entries are placed by their `hour`
/// field; missing hours are zero and out-of-range hours are ignored.
pub fn hourly_series(distribution: Option<&HourlyDistribution>) -> [u64; 24] {
    let mut series = [0u64; 24];
    if let Some(distribution) = distribution {
        for entry in &distribution.hourly_distribution {
            match usize::try_from(entry.hour) {
                Ok(hour) if hour < 24 => series[hour] = entry.trip_count,
                _ => {}
            }
        }
    }
    series
}

pub fn hourly_chart_data(distribution: Option<&HourlyDistribution>) -> ChartData {
    ChartData {
        labels: (0..24).map(|h| format!("{h}:00")).collect(),
        values: hourly_series(distribution).to_vec(),
        x_title: Some("Hour of Day"),
        y_title: "Number of Trips",
    }
}

pub fn daily_chart_data(patterns: Option<&DailyPatterns>) -> ChartData {
    let (labels, values): (Vec<String>, Vec<u64>) = match patterns {
        Some(patterns) => patterns
            .daily_patterns
            .iter()
            .map(|day| (day.day_name.clone(), day.trip_count))
            .unzip(),
        None => (
            WEEKDAY_NAMES.iter().map(|d| d.to_string()).collect(),
            vec![0; WEEKDAY_NAMES.len()],
        ),
    };
    ChartData {
        labels,
        values,
        x_title: None,
        y_title: "Number of Trips",
    }
}

fn panel_from<T>(
    panel: Panel,
    section: &Section<T>,
    rows: impl FnOnce(&T) -> Vec<PanelRow>,
) -> PanelContent {
    match section {
        Err(_) => PanelContent::NoData(panel.unavailable_message()),
        Ok(data) => {
            let rows = rows(data);
            if rows.is_empty() {
                PanelContent::NoData(panel.empty_message().to_string())
            } else {
                PanelContent::Rows(rows)
            }
        }
    }
}

pub fn cluster_ranking_panel(section: &Section<ClusterRanking>) -> PanelContent {
    panel_from(Panel::ClusterRanking, section, |ranking| {
        ranking
            .ranked_clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| PanelRow {
                title: format!("#{} Cluster {}", index + 1, cluster.cluster_id),
                lines: vec![
                    format_coords(cluster.center_lat, cluster.center_lon),
                    format!("{} trips", cluster.trip_count),
                    format!("{:.1} min avg", seconds_to_minutes(cluster.avg_duration)),
                    format!(
                        "{:.1} min total duration",
                        seconds_to_minutes(cluster.total_duration)
                    ),
                ],
            })
            .collect()
    })
}

pub fn top_trips_panel(section: &Section<SortedTrips>) -> PanelContent {
    panel_from(Panel::TopTrips, section, |sorted| {
        sorted
            .trips
            .iter()
            .enumerate()
            .map(|(index, trip)| PanelRow {
                title: format!("Trip {}", index + 1),
                lines: vec![
                    format!("{:.1} min", trip.trip_duration_minutes),
                    format!("{:.1} km", trip.trip_distance_km),
                    format!("{:.1} km/h", trip.trip_speed_km_h),
                    format_coords(trip.pickup_location.lat, trip.pickup_location.lon),
                ],
            })
            .collect()
    })
}

pub fn hourly_pickups_panel(section: &Section<HourlyPickups>) -> PanelContent {
    panel_from(Panel::HourlyPickups, section, |pickups| {
        pickups
            .sorted()
            .into_iter()
            .map(|(hour, count)| PanelRow {
                title: format_hour_12h(hour),
                lines: vec![format!("{count} pickups")],
            })
            .collect()
    })
}

// ==================== Coordinator ====================

/// Owns the chart instances currently alive in the sink.
#[derive(Debug, Default)]
pub struct RenderCoordinator {
    hourly_chart: Option<ChartHandle>,
    daily_chart: Option<ChartHandle>,
}

impl RenderCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redraw every widget from `snapshot`.
    pub fn render(&mut self, snapshot: &Snapshot, sink: &dyn DashboardSink) {
        render_summary(&snapshot.summary, sink);
        self.render_charts(&snapshot.charts, sink);
        render_analytics(&snapshot.analytics, sink);
    }

    pub fn render_charts(&mut self, charts: &ChartSections, sink: &dyn DashboardSink) {
        let hourly = hourly_chart_data(charts.hourly.as_ref().ok());
        let daily = daily_chart_data(charts.daily.as_ref().ok());
        replace_chart(&mut self.hourly_chart, ChartKind::Hourly, &hourly, sink);
        replace_chart(&mut self.daily_chart, ChartKind::Daily, &daily, sink);
    }

    pub fn chart_handle(&self, kind: ChartKind) -> Option<ChartHandle> {
        match kind {
            ChartKind::Hourly => self.hourly_chart,
            ChartKind::Daily => self.daily_chart,
        }
    }
}

fn replace_chart(
    slot: &mut Option<ChartHandle>,
    kind: ChartKind,
    data: &ChartData,
    sink: &dyn DashboardSink,
) {
    if let Some(previous) = slot.take() {
        sink.destroy_chart(previous);
    }
    *slot = Some(sink.create_chart(kind, data));
}

pub fn render_summary(summary: &Section<SummaryOverview>, sink: &dyn DashboardSink) {
    for (metric, value) in summary_metrics(summary.as_ref().ok()) {
        sink.set_metric(metric, &value);
    }
}

pub fn render_analytics(analytics: &AnalyticsSections, sink: &dyn DashboardSink) {
    sink.set_metric(
        Metric::BusiestHour,
        &busiest_hour_label(analytics.busiest_hour.as_ref().ok()),
    );
    sink.set_panel(
        Panel::ClusterRanking,
        &cluster_ranking_panel(&analytics.cluster_ranking),
    );
    sink.set_panel(Panel::TopTrips, &top_trips_panel(&analytics.sorted_trips));
    sink.set_panel(
        Panel::HourlyPickups,
        &hourly_pickups_panel(&analytics.hourly_pickups),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::FetchError,
        models::{DayCount, HourlyCount, LatLon, RankedCluster, SortedTrip},
        traits::RecordingSink,
    };

    fn failed<T>(endpoint: &str) -> Section<T> {
        Err(FetchError::Status {
            endpoint: endpoint.to_string(),
            status: 500,
        })
    }

    fn distribution(entries: &[(i64, u64)]) -> HourlyDistribution {
        HourlyDistribution {
            hourly_distribution: entries
                .iter()
                .map(|&(hour, trip_count)| HourlyCount { hour, trip_count })
                .collect(),
        }
    }

    // ==================== Hour Formatting Tests ====================

    #[test]
    fn test_format_hour_midnight_and_noon() {
        assert_eq!(format_hour_12h(0), "12AM");
        assert_eq!(format_hour_12h(12), "12PM");
    }

    #[test]
    fn test_format_hour_afternoon() {
        assert_eq!(format_hour_12h(17), "5PM");
        assert_eq!(format_hour_12h(9), "9AM");
        assert_eq!(format_hour_12h(23), "11PM");
    }

    // ==================== Metric Tests ====================

    #[test]
    fn test_summary_metrics_formatting() {
        let summary = SummaryOverview {
            total_trips: Some(1458),
            avg_duration_minutes: Some(13.456),
            avg_distance_km: Some(3.04),
            avg_speed_km_h: Some(14.95),
            avg_passengers: Some(1.66),
        };
        let metrics = summary_metrics(Some(&summary));
        assert_eq!(
            metrics,
            vec![
                (Metric::TotalTrips, "1458".to_string()),
                (Metric::AvgDuration, "13.5 min".to_string()),
                (Metric::AvgDistance, "3.0 km".to_string()),
                (Metric::AvgSpeed, "14.9 km/h".to_string()),
                (Metric::AvgPassengers, "1.7".to_string()),
            ]
        );
    }

    #[test]
    fn test_summary_metrics_placeholders_when_missing() {
        let metrics = summary_metrics(None);
        let values: Vec<_> = metrics.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["--", "-- min", "-- km", "-- km/h", "--"]);
    }

    #[test]
    fn test_busiest_hour_label() {
        let busiest = BusiestHour {
            busiest_hour: Some(18),
            trip_count: 120,
        };
        assert_eq!(busiest_hour_label(Some(&busiest)), "6PM (120 trips)");
    }

    #[test]
    fn test_busiest_hour_null_shows_dash() {
        let busiest = BusiestHour {
            busiest_hour: None,
            trip_count: 0,
        };
        assert_eq!(busiest_hour_label(Some(&busiest)), DASH);
        assert_eq!(busiest_hour_label(None), DASH);
    }

    // ==================== Chart Tests ====================

    #[test]
    fn test_hourly_series_sparse_entry() {
        let series = hourly_series(Some(&distribution(&[(3, 7)])));
        assert_eq!(series.len(), 24);
        assert_eq!(series[3], 7);
        assert_eq!(series.iter().sum::<u64>(), 7);
    }

    #[test]
    fn test_hourly_series_uses_hour_field_not_position() {
        let series = hourly_series(Some(&distribution(&[(22, 4), (1, 9), (0, 2)])));
        assert_eq!(series[0], 2);
        assert_eq!(series[1], 9);
        assert_eq!(series[22], 4);
    }

    #[test]
    fn test_hourly_series_ignores_out_of_range() {
        let series = hourly_series(Some(&distribution(&[(-1, 5), (24, 6), (99, 1)])));
        assert_eq!(series, [0; 24]);
    }

    #[test]
    fn test_hourly_chart_labels() {
        let data = hourly_chart_data(None);
        assert_eq!(data.labels.len(), 24);
        assert_eq!(data.labels[0], "0:00");
        assert_eq!(data.labels[23], "23:00");
        assert_eq!(data.values, vec![0; 24]);
    }

    #[test]
    fn test_daily_chart_keeps_backend_order() {
        let patterns = DailyPatterns {
            daily_patterns: vec![
                DayCount {
                    day_name: "Sunday".to_string(),
                    trip_count: 3,
                },
                DayCount {
                    day_name: "Monday".to_string(),
                    trip_count: 8,
                },
            ],
        };
        let data = daily_chart_data(Some(&patterns));
        assert_eq!(data.labels, vec!["Sunday", "Monday"]);
        assert_eq!(data.values, vec![3, 8]);
    }

    #[test]
    fn test_daily_chart_fallback_is_zeroed_week() {
        let data = daily_chart_data(None);
        assert_eq!(data.labels.len(), 7);
        assert_eq!(data.labels[0], "Monday");
        assert_eq!(data.values, vec![0; 7]);
    }

    #[test]
    fn test_charts_destroyed_before_recreate() {
        let sink = RecordingSink::new();
        let mut coordinator = RenderCoordinator::new();
        let charts = ChartSections {
            hourly: Ok(distribution(&[(8, 40)])),
            daily: failed("temporal/daily-patterns"),
        };

        coordinator.render_charts(&charts, &sink);
        let first = coordinator.chart_handle(ChartKind::Hourly).unwrap();
        coordinator.render_charts(&charts, &sink);
        let second = coordinator.chart_handle(ChartKind::Hourly).unwrap();

        assert_ne!(first, second);
        assert_eq!(sink.live_chart_count(), 2);
        assert_eq!(sink.destroyed_charts(), 2);
        assert_eq!(sink.chart(ChartKind::Hourly).unwrap().values[8], 40);
    }

    // ==================== Panel Tests ====================

    #[test]
    fn test_cluster_ranking_converts_seconds() {
        let ranking = ClusterRanking {
            ranked_clusters: vec![RankedCluster {
                cluster_id: 4,
                center_lat: 40.75123,
                center_lon: -73.98765,
                trip_count: 6,
                avg_duration: 900.0,
                total_duration: 5400.0,
            }],
        };
        let content = cluster_ranking_panel(&Ok(ranking));
        let rows = content.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "#1 Cluster 4");
        assert!(rows[0].lines.contains(&"15.0 min avg".to_string()));
        assert!(rows[0].lines.contains(&"90.0 min total duration".to_string()));
        assert!(rows[0].lines.contains(&"40.7512, -73.9877".to_string()));
    }

    #[test]
    fn test_cluster_ranking_empty_and_failed() {
        let empty = cluster_ranking_panel(&Ok(ClusterRanking {
            ranked_clusters: vec![],
        }));
        assert_eq!(
            empty,
            PanelContent::NoData("No cluster ranking data available".to_string())
        );

        let failed = cluster_ranking_panel(&failed("custom/cluster-ranking"));
        assert_eq!(
            failed,
            PanelContent::NoData("No data received from cluster ranking endpoint".to_string())
        );
    }

    #[test]
    fn test_top_trips_rows_keep_backend_order() {
        let trip = |minutes: f64| SortedTrip {
            trip_duration_minutes: minutes,
            trip_distance_km: 12.34,
            trip_speed_km_h: 16.2,
            pickup_location: LatLon::new(40.75, -73.99),
        };
        let sorted = SortedTrips {
            trips: vec![trip(45.5), trip(38.2)],
        };
        let content = top_trips_panel(&Ok(sorted));
        let rows = content.rows();
        assert_eq!(rows[0].title, "Trip 1");
        assert_eq!(rows[0].lines[0], "45.5 min");
        assert_eq!(rows[1].lines[0], "38.2 min");
        assert_eq!(rows[1].lines[1], "12.3 km");
    }

    #[test]
    fn test_top_trips_failed_has_no_fallback_rows() {
        let content = top_trips_panel(&failed("custom/trip-sorting"));
        assert!(content.rows().is_empty());
    }

    #[test]
    fn test_hourly_pickups_sorted_ascending() {
        let body = r#"{"hourly_pickups": {"17": 42, "3": 5, "11": 20}}"#;
        let pickups: HourlyPickups = serde_json::from_str(body).unwrap();
        let content = hourly_pickups_panel(&Ok(pickups));
        let titles: Vec<_> = content.rows().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["3AM", "11AM", "5PM"]);
        assert_eq!(content.rows()[2].lines, vec!["42 pickups".to_string()]);
    }

    #[test]
    fn test_hourly_pickups_empty_map() {
        let pickups = HourlyPickups {
            hourly_pickups: Default::default(),
        };
        assert_eq!(
            hourly_pickups_panel(&Ok(pickups)),
            PanelContent::NoData("No hourly pickup data available".to_string())
        );
    }

    // ==================== Coordinator Tests ====================

    #[test]
    fn test_render_is_idempotent() {
        let sink = RecordingSink::new();
        let mut coordinator = RenderCoordinator::new();
        let snapshot = Snapshot {
            summary: Ok(SummaryOverview {
                total_trips: Some(10),
                ..Default::default()
            }),
            ..Snapshot::unavailable(&FetchError::Network {
                endpoint: "summary/overview".to_string(),
                message: "connection refused".to_string(),
            })
        };

        coordinator.render(&snapshot, &sink);
        let first = sink.visible_state();
        coordinator.render(&snapshot, &sink);
        let second = sink.visible_state();

        assert_eq!(first, second);
        assert_eq!(sink.metric(Metric::TotalTrips).as_deref(), Some("10"));
        assert_eq!(sink.metric(Metric::AvgSpeed).as_deref(), Some("-- km/h"));
    }
}
