//! Map layer manager.
//!
//! Owns every transient overlay it puts on the [`MapSurface`] and removes all
//! of them before each redraw, so repeated redraws never accumulate
//! duplicates.

use crate::{
    config::MapConfig,
    models::{ClusterPoint, FlowEdge, LatLon},
    render::format_coords,
    traits::MapSurface,
};

const MIN_CLUSTER_RADIUS: f64 = 10.0;
const CLUSTER_RADIUS_FACTOR: f64 = 3.0;
const MIN_FLOW_WEIGHT: f64 = 2.0;
const FLOW_WEIGHT_FACTOR: f64 = 3.0;
const FLOW_ENDPOINT_RADIUS: f64 = 6.0;
const FIT_PADDING: f64 = 0.1;

/// Handle to an overlay owned by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    PickupCluster,
    FlowPickup,
    FlowDropoff,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    CircleMarker {
        center: LatLon,
        radius: f64,
        style: MarkerStyle,
        popup: String,
    },
    Polyline {
        from: LatLon,
        to: LatLon,
        weight: f64,
        dashed: bool,
        popup: String,
    },
    StatusPopup {
        at: LatLon,
        content: String,
    },
}

impl Overlay {
    pub fn popup(&self) -> &str {
        match self {
            Overlay::CircleMarker { popup, .. } | Overlay::Polyline { popup, .. } => popup,
            Overlay::StatusPopup { content, .. } => content,
        }
    }

    pub fn is_status_popup(&self) -> bool {
        matches!(self, Overlay::StatusPopup { .. })
    }
}

/// Axis-aligned lat/lon box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: LatLon,
    pub north_east: LatLon,
}

impl Bounds {
    pub fn around<'a>(points: impl IntoIterator<Item = &'a LatLon>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (mut sw, mut ne) = (first, first);
        for p in iter {
            sw.lat = sw.lat.min(p.lat);
            sw.lon = sw.lon.min(p.lon);
            ne.lat = ne.lat.max(p.lat);
            ne.lon = ne.lon.max(p.lon);
        }
        Some(Self {
            south_west: sw,
            north_east: ne,
        })
    }

    pub fn pad(self, ratio: f64) -> Self {
        let dlat = (self.north_east.lat - self.south_west.lat) * ratio;
        let dlon = (self.north_east.lon - self.south_west.lon) * ratio;
        Self {
            south_west: LatLon::new(self.south_west.lat - dlat, self.south_west.lon - dlon),
            north_east: LatLon::new(self.north_east.lat + dlat, self.north_east.lon + dlon),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapLayer {
    Pickups,
    Flows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerState {
    #[default]
    Inactive,
    Active,
}

impl LayerState {
    pub fn toggled(self) -> Self {
        match self {
            LayerState::Inactive => LayerState::Active,
            LayerState::Active => LayerState::Inactive,
        }
    }

    pub fn is_active(self) -> bool {
        self == LayerState::Active
    }
}

/// Marker radius grows with the square root of the trip count, floored so
/// small clusters stay visible.
pub fn cluster_radius(trip_count: u64) -> f64 {
    ((trip_count as f64).sqrt() * CLUSTER_RADIUS_FACTOR).max(MIN_CLUSTER_RADIUS)
}

/// Line weight grows with the natural log of the trip count, floored.
pub fn flow_weight(trip_count: u64) -> f64 {
    if trip_count == 0 {
        return MIN_FLOW_WEIGHT;
    }
    ((trip_count as f64).ln() * FLOW_WEIGHT_FACTOR).max(MIN_FLOW_WEIGHT)
}

fn optional_metric(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1} {unit}"))
}

fn cluster_popup(cluster: &ClusterPoint) -> String {
    format!(
        "Pickup Hotspot\nLocation: {}\nTrips: {}\nAvg Duration: {}\nCluster ID: {}",
        format_coords(cluster.center.lat, cluster.center.lon),
        cluster.trip_count,
        optional_metric(cluster.avg_duration_minutes, "min"),
        cluster.cluster_id
    )
}

fn flow_popup(flow: &FlowEdge) -> String {
    format!(
        "Travel Route\nPickup: {}\nDropoff: {}\nTrips: {}\nAvg Duration: {}\nAvg Distance: {}",
        format_coords(flow.pickup.lat, flow.pickup.lon),
        format_coords(flow.dropoff.lat, flow.dropoff.lon),
        flow.trip_count,
        optional_metric(flow.avg_duration_minutes, "min"),
        optional_metric(flow.avg_distance_km, "km")
    )
}

fn status_popup(clusters_loaded: bool, flows_loaded: bool) -> String {
    let line = |loaded: bool, what: &str| {
        if loaded {
            format!("{what} data loaded")
        } else {
            format!("No {what} data available")
        }
    };
    format!(
        "Data Status\n{}\n{}\nCheck if your database has sufficient trip data",
        line(clusters_loaded, "cluster"),
        line(flows_loaded, "flow")
    )
}

/// Layer toggles, the last loaded map data, and the overlays drawn from it.
#[derive(Debug)]
pub struct MapLayerManager {
    home: LatLon,
    zoom: u8,
    pickups: LayerState,
    flows_layer: LayerState,
    clusters: Vec<ClusterPoint>,
    flows: Vec<FlowEdge>,
    overlays: Vec<OverlayId>,
}

impl MapLayerManager {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            home: LatLon::new(config.center_lat, config.center_lon),
            zoom: config.zoom,
            pickups: LayerState::Inactive,
            flows_layer: LayerState::Inactive,
            clusters: Vec::new(),
            flows: Vec::new(),
            overlays: Vec::new(),
        }
    }

    /// Move the surface back to the configured home view.
    pub fn reset_view(&self, surface: &dyn MapSurface) {
        surface.set_view(self.home, self.zoom);
    }

    pub fn layer_state(&self, layer: MapLayer) -> LayerState {
        match layer {
            MapLayer::Pickups => self.pickups,
            MapLayer::Flows => self.flows_layer,
        }
    }

    /// Flip a layer and redraw immediately.
    pub fn toggle(&mut self, layer: MapLayer, surface: &dyn MapSurface) -> LayerState {
        let state = match layer {
            MapLayer::Pickups => &mut self.pickups,
            MapLayer::Flows => &mut self.flows_layer,
        };
        *state = state.toggled();
        let new_state = *state;
        tracing::debug!("Layer {:?} is now {:?}", layer, new_state);
        self.redraw(surface);
        new_state
    }

    /// Replace the map data wholesale. Does not redraw.
    pub fn set_data(&mut self, clusters: Vec<ClusterPoint>, flows: Vec<FlowEdge>) {
        self.clusters = clusters;
        self.flows = flows;
    }

    pub fn clusters(&self) -> &[ClusterPoint] {
        &self.clusters
    }

    pub fn flows(&self) -> &[FlowEdge] {
        &self.flows
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    fn add(&mut self, surface: &dyn MapSurface, overlay: Overlay) {
        let id = surface.add_overlay(overlay);
        self.overlays.push(id);
    }

    /// Remove every overlay this manager added.
    pub fn clear(&mut self, surface: &dyn MapSurface) {
        for id in self.overlays.drain(..) {
            surface.remove_overlay(id);
        }
    }

    /// Clear, then draw each active layer from the current data. An active
    /// layer without data gets a status popup at the home position.
    pub fn redraw(&mut self, surface: &dyn MapSurface) {
        self.clear(surface);

        let show_pickups = self.pickups.is_active();
        let show_flows = self.flows_layer.is_active();

        if show_pickups && !self.clusters.is_empty() {
            let markers: Vec<Overlay> = self
                .clusters
                .iter()
                .map(|cluster| Overlay::CircleMarker {
                    center: cluster.center,
                    radius: cluster_radius(cluster.trip_count),
                    style: MarkerStyle::PickupCluster,
                    popup: cluster_popup(cluster),
                })
                .collect();
            for marker in markers {
                self.add(surface, marker);
            }
            if let Some(bounds) = Bounds::around(self.clusters.iter().map(|c| &c.center)) {
                surface.fit_bounds(bounds.pad(FIT_PADDING));
            }
        }

        if show_flows && !self.flows.is_empty() {
            let mut overlays = Vec::with_capacity(self.flows.len() * 3);
            for flow in &self.flows {
                overlays.push(Overlay::Polyline {
                    from: flow.pickup,
                    to: flow.dropoff,
                    weight: flow_weight(flow.trip_count),
                    dashed: flow.trip_count <= 1,
                    popup: flow_popup(flow),
                });
                overlays.push(Overlay::CircleMarker {
                    center: flow.pickup,
                    radius: FLOW_ENDPOINT_RADIUS,
                    style: MarkerStyle::FlowPickup,
                    popup: format!("Pickup Point\n{} trips from here", flow.trip_count),
                });
                overlays.push(Overlay::CircleMarker {
                    center: flow.dropoff,
                    radius: FLOW_ENDPOINT_RADIUS,
                    style: MarkerStyle::FlowDropoff,
                    popup: format!("Dropoff Point\n{} trips to here", flow.trip_count),
                });
            }
            for overlay in overlays {
                self.add(surface, overlay);
            }
        }

        if (show_pickups && self.clusters.is_empty()) || (show_flows && self.flows.is_empty()) {
            let content = status_popup(!self.clusters.is_empty(), !self.flows.is_empty());
            let at = self.home;
            self.add(surface, Overlay::StatusPopup { at, content });
        }

        tracing::debug!("Map redrawn with {} overlays", self.overlays.len());
    }
}
