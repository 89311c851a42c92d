//! Rendering seams of the dashboard.
//!
//! This module provides traits for:
//! - `DashboardSink`: metrics, charts, panels, the loading indicator and alerts
//! - `MapSurface`: transient map overlays
//!
//! Each trait has a console implementation used by the binary and a
//! recording implementation for deterministic tests.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    map::{Bounds, Overlay, OverlayId},
    models::LatLon,
    render::{ChartData, ChartHandle, ChartKind, Metric, Panel, PanelContent},
};

// ==================== DashboardSink Trait ====================

/// Everything the render coordinator and dashboard write to, one method per
/// concern.
pub trait DashboardSink: Send + Sync {
    fn set_loading(&self, visible: bool);

    /// Blocking, user-visible message.
    fn alert(&self, message: &str);

    fn set_metric(&self, metric: Metric, value: &str);

    fn create_chart(&self, kind: ChartKind, data: &ChartData) -> ChartHandle;

    fn destroy_chart(&self, handle: ChartHandle);

    /// Replace the whole content of a panel.
    fn set_panel(&self, panel: Panel, content: &PanelContent);
}

// ==================== MapSurface Trait ====================

pub trait MapSurface: Send + Sync {
    fn add_overlay(&self, overlay: Overlay) -> OverlayId;

    fn remove_overlay(&self, id: OverlayId);

    fn fit_bounds(&self, bounds: Bounds);

    /// Centre the map without touching overlays.
    fn set_view(&self, center: LatLon, zoom: u8);
}

// ==================== Console Implementations ====================

const BAR_WIDTH: u64 = 40;

/// Bar length for `value` on a scale where `max` fills [`BAR_WIDTH`].
fn bar_width(value: u64, max: u64) -> usize {
    let scaled = u128::from(value) * u128::from(BAR_WIDTH) / u128::from(max.max(1));
    usize::try_from(scaled).unwrap_or(usize::MAX)
}

/// Prints every update to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    next_chart: AtomicU64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DashboardSink for ConsoleSink {
    fn set_loading(&self, visible: bool) {
        if visible {
            println!("Loading...");
        }
    }

    fn alert(&self, message: &str) {
        eprintln!("!! {message}");
    }

    fn set_metric(&self, metric: Metric, value: &str) {
        println!("{:<16} {}", metric.label(), value);
    }

    fn create_chart(&self, kind: ChartKind, data: &ChartData) -> ChartHandle {
        let max = data.values.iter().copied().max().unwrap_or(0).max(1);
        println!("\n{:?} chart ({})", kind, data.y_title);
        for (label, value) in data.labels.iter().zip(&data.values) {
            let bar = "#".repeat(bar_width(*value, max));
            println!("{label:>10} | {bar} {value}");
        }
        ChartHandle(self.next_chart.fetch_add(1, Ordering::Relaxed))
    }

    fn destroy_chart(&self, _handle: ChartHandle) {}

    fn set_panel(&self, panel: Panel, content: &PanelContent) {
        println!("\n== {} ==", panel.source_label());
        match content {
            PanelContent::NoData(message) => println!("  {message}"),
            PanelContent::Rows(rows) => {
                for row in rows {
                    println!("  {}", row.title);
                    for line in &row.lines {
                        println!("      {line}");
                    }
                }
            }
        }
    }
}

/// Lists overlays as they are added.
#[derive(Debug, Default)]
pub struct ConsoleMap {
    next_id: AtomicU64,
}

impl ConsoleMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapSurface for ConsoleMap {
    fn add_overlay(&self, overlay: Overlay) -> OverlayId {
        let id = OverlayId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match &overlay {
            Overlay::CircleMarker { center, radius, .. } => println!(
                "[map] marker at {:.4}, {:.4} r={:.1}",
                center.lat, center.lon, radius
            ),
            Overlay::Polyline {
                from,
                to,
                weight,
                dashed,
                ..
            } => println!(
                "[map] line {:.4}, {:.4} -> {:.4}, {:.4} w={:.1}{}",
                from.lat,
                from.lon,
                to.lat,
                to.lon,
                weight,
                if *dashed { " (dashed)" } else { "" }
            ),
            Overlay::StatusPopup { content, .. } => println!("[map] {}", content.replace('\n', " | ")),
        }
        id
    }

    fn remove_overlay(&self, _id: OverlayId) {}

    fn fit_bounds(&self, bounds: Bounds) {
        tracing::debug!("Fitting map to {:?}", bounds);
    }

    fn set_view(&self, center: LatLon, zoom: u8) {
        println!("[map] view {:.4}, {:.4} zoom {}", center.lat, center.lon, zoom);
    }
}

// ==================== Recording Implementations ====================

/// What a user would currently see on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisibleState {
    pub loading: bool,
    pub metrics: BTreeMap<Metric, String>,
    pub charts: BTreeMap<ChartKind, ChartData>,
    pub panels: BTreeMap<Panel, PanelContent>,
}

#[derive(Debug, Default)]
struct SinkRecord {
    loading: bool,
    loading_changes: Vec<bool>,
    alerts: Vec<String>,
    metrics: BTreeMap<Metric, String>,
    live_charts: BTreeMap<ChartHandle, (ChartKind, ChartData)>,
    next_chart: u64,
    destroyed_charts: usize,
    panels: BTreeMap<Panel, PanelContent>,
}

/// Sink for testing that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    record: Arc<Mutex<SinkRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(&self, metric: Metric) -> Option<String> {
        self.record.lock().unwrap().metrics.get(&metric).cloned()
    }

    pub fn panel(&self, panel: Panel) -> Option<PanelContent> {
        self.record.lock().unwrap().panels.get(&panel).cloned()
    }

    /// Data of the live chart of `kind`, if exactly one exists.
    pub fn chart(&self, kind: ChartKind) -> Option<ChartData> {
        let record = self.record.lock().unwrap();
        let mut matching = record.live_charts.values().filter(|(k, _)| *k == kind);
        let (_, data) = matching.next()?;
        if matching.next().is_some() {
            return None;
        }
        Some(data.clone())
    }

    pub fn live_chart_count(&self) -> usize {
        self.record.lock().unwrap().live_charts.len()
    }

    pub fn destroyed_charts(&self) -> usize {
        self.record.lock().unwrap().destroyed_charts
    }

    pub fn alerts(&self) -> Vec<String> {
        self.record.lock().unwrap().alerts.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.record.lock().unwrap().loading
    }

    /// Every loading indicator change, in order.
    pub fn loading_changes(&self) -> Vec<bool> {
        self.record.lock().unwrap().loading_changes.clone()
    }

    pub fn visible_state(&self) -> VisibleState {
        let record = self.record.lock().unwrap();
        VisibleState {
            loading: record.loading,
            metrics: record.metrics.clone(),
            charts: record
                .live_charts
                .values()
                .map(|(kind, data)| (*kind, data.clone()))
                .collect(),
            panels: record.panels.clone(),
        }
    }
}

impl DashboardSink for RecordingSink {
    fn set_loading(&self, visible: bool) {
        let mut record = self.record.lock().unwrap();
        record.loading = visible;
        record.loading_changes.push(visible);
    }

    fn alert(&self, message: &str) {
        self.record.lock().unwrap().alerts.push(message.to_string());
    }

    fn set_metric(&self, metric: Metric, value: &str) {
        self.record
            .lock()
            .unwrap()
            .metrics
            .insert(metric, value.to_string());
    }

    fn create_chart(&self, kind: ChartKind, data: &ChartData) -> ChartHandle {
        let mut record = self.record.lock().unwrap();
        let handle = ChartHandle(record.next_chart);
        record.next_chart += 1;
        record.live_charts.insert(handle, (kind, data.clone()));
        handle
    }

    fn destroy_chart(&self, handle: ChartHandle) {
        let mut record = self.record.lock().unwrap();
        if record.live_charts.remove(&handle).is_some() {
            record.destroyed_charts += 1;
        }
    }

    fn set_panel(&self, panel: Panel, content: &PanelContent) {
        self.record
            .lock()
            .unwrap()
            .panels
            .insert(panel, content.clone());
    }
}

#[derive(Debug, Default)]
struct MapRecord {
    next_id: u64,
    overlays: BTreeMap<OverlayId, Overlay>,
    added: usize,
    fitted: Vec<Bounds>,
    view: Option<(LatLon, u8)>,
}

/// Map surface for testing that keeps the live overlay set.
#[derive(Debug, Clone, Default)]
pub struct RecordingMap {
    record: Arc<Mutex<MapRecord>>,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live overlays in insertion order.
    pub fn overlays(&self) -> Vec<Overlay> {
        self.record
            .lock()
            .unwrap()
            .overlays
            .values()
            .cloned()
            .collect()
    }

    pub fn overlay_count(&self) -> usize {
        self.record.lock().unwrap().overlays.len()
    }

    /// Overlays ever added, including removed ones.
    pub fn total_added(&self) -> usize {
        self.record.lock().unwrap().added
    }

    pub fn status_popups(&self) -> Vec<Overlay> {
        self.overlays()
            .into_iter()
            .filter(Overlay::is_status_popup)
            .collect()
    }

    pub fn fitted_bounds(&self) -> Vec<Bounds> {
        self.record.lock().unwrap().fitted.clone()
    }

    pub fn view(&self) -> Option<(LatLon, u8)> {
        self.record.lock().unwrap().view
    }
}

impl MapSurface for RecordingMap {
    fn add_overlay(&self, overlay: Overlay) -> OverlayId {
        let mut record = self.record.lock().unwrap();
        let id = OverlayId(record.next_id);
        record.next_id += 1;
        record.added += 1;
        record.overlays.insert(id, overlay);
        id
    }

    fn remove_overlay(&self, id: OverlayId) {
        self.record.lock().unwrap().overlays.remove(&id);
    }

    fn fit_bounds(&self, bounds: Bounds) {
        self.record.lock().unwrap().fitted.push(bounds);
    }

    fn set_view(&self, center: LatLon, zoom: u8) {
        self.record.lock().unwrap().view = Some((center, zoom));
    }
}
