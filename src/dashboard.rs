//! The dashboard application state: active filters, load sequencing, and the
//! render coordinator and map layer manager it drives.
//!
//! Every load cycle is tagged with a ticket from a monotonically increasing
//! sequence. Only the result of the most recently issued load is applied; an
//! older load that resolves late is discarded before it touches any display
//! state.
//!
//! Loads are split in three steps so a host can keep several in flight:
//! `begin_load` issues the ticket, [`PendingLoad::fetch`] runs without
//! borrowing the dashboard, and `finish_load` applies or discards the
//! outcome. Widget refreshes follow the same shape.

use std::sync::Arc;

use anyhow::Result;
use chrono::Weekday;

use crate::{
    aggregator::{AnalyticsSections, ChartSections, DataAggregator, LoadError, Snapshot},
    api::AnalyticsApiClient,
    config::{AppConfig, MapConfig},
    filters::FilterState,
    map::{LayerState, MapLayer, MapLayerManager},
    render::{RenderCoordinator, render_analytics},
    traits::{DashboardSink, MapSurface},
};

pub const UNREACHABLE_ALERT: &str =
    "Failed to load data. Please make sure the API server is running.";

/// Identifies one issued load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

#[derive(Debug, Default)]
pub struct LoadSequencer {
    latest: u64,
}

impl LoadSequencer {
    /// Issue the next ticket. Every ticket issued before it becomes stale.
    pub fn issue(&mut self) -> LoadTicket {
        self.latest += 1;
        LoadTicket(self.latest)
    }

    /// The most recently issued ticket, if any load was issued yet.
    pub fn latest(&self) -> Option<LoadTicket> {
        (self.latest > 0).then_some(LoadTicket(self.latest))
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.latest
    }
}

/// A full load that has been issued but not completed.
///
/// Owns a copy of the filters and of the aggregator, so fetching it holds
/// no borrow of the [`Dashboard`].
#[derive(Debug, Clone)]
pub struct PendingLoad {
    pub ticket: LoadTicket,
    pub filters: FilterState,
    aggregator: DataAggregator,
}

impl PendingLoad {
    /// Fetch every section for the captured filters.
    pub async fn fetch(self) -> CompletedLoad {
        let result = self.aggregator.load_all(&self.filters).await;
        CompletedLoad {
            ticket: self.ticket,
            result,
        }
    }
}

/// Outcome of a fetched load, ready for [`Dashboard::finish_load`].
#[derive(Debug, Clone)]
pub struct CompletedLoad {
    pub ticket: LoadTicket,
    pub result: Result<Snapshot, LoadError>,
}

/// A widget that can be refreshed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Widget {
    Charts,
    Analytics,
}

/// Identifies one widget refresh. It is current only while no newer refresh
/// of the same widget and no newer full load has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    widget: Widget,
    ticket: LoadTicket,
    issued_under: Option<LoadTicket>,
}

impl RefreshTicket {
    pub fn widget(&self) -> Widget {
        self.widget
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshSections {
    Charts(ChartSections),
    Analytics(AnalyticsSections),
}

#[derive(Debug, Clone)]
pub struct PendingRefresh {
    pub ticket: RefreshTicket,
    pub filters: FilterState,
    aggregator: DataAggregator,
}

impl PendingRefresh {
    /// Fetch only the sections of the ticket's widget.
    pub async fn fetch(self) -> CompletedRefresh {
        let sections = match self.ticket.widget {
            Widget::Charts => {
                RefreshSections::Charts(self.aggregator.load_charts(&self.filters).await)
            }
            Widget::Analytics => {
                RefreshSections::Analytics(self.aggregator.load_analytics(&self.filters).await)
            }
        };
        CompletedRefresh {
            ticket: self.ticket,
            sections,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletedRefresh {
    pub ticket: RefreshTicket,
    pub sections: RefreshSections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDisposition {
    /// The snapshot was rendered.
    Applied,
    /// A newer load was issued meanwhile; nothing was touched.
    Stale,
    /// Nothing could be loaded; placeholders were rendered and the user
    /// alerted.
    Failed,
}

pub struct Dashboard {
    aggregator: DataAggregator,
    filters: FilterState,
    sequencer: LoadSequencer,
    chart_refreshes: LoadSequencer,
    analytics_refreshes: LoadSequencer,
    coordinator: RenderCoordinator,
    map: MapLayerManager,
    sink: Arc<dyn DashboardSink>,
    surface: Arc<dyn MapSurface>,
}

impl Dashboard {
    /// Build a dashboard with unconstrained filters and both layers
    /// inactive, and centre the map on its home view. Does not load.
    pub fn new(
        aggregator: DataAggregator,
        map_config: &MapConfig,
        sink: Arc<dyn DashboardSink>,
        surface: Arc<dyn MapSurface>,
    ) -> Self {
        let map = MapLayerManager::new(map_config);
        map.reset_view(surface.as_ref());
        Self {
            aggregator,
            filters: FilterState::unconstrained(),
            sequencer: LoadSequencer::default(),
            chart_refreshes: LoadSequencer::default(),
            analytics_refreshes: LoadSequencer::default(),
            coordinator: RenderCoordinator::new(),
            map,
            sink,
            surface,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        sink: Arc<dyn DashboardSink>,
        surface: Arc<dyn MapSurface>,
    ) -> Result<Self> {
        let client = AnalyticsApiClient::new(&config.api, &config.network)?;
        let aggregator = DataAggregator::new(client, config.queries.clone());
        Ok(Self::new(aggregator, &config.map, sink, surface))
    }

    /// Start from `filters` instead of the unconstrained state. Does not load.
    pub fn with_filters(&mut self, filters: FilterState) -> &mut Self {
        self.filters = filters;
        self
    }

    pub fn filters(&self) -> FilterState {
        self.filters
    }

    pub fn aggregator(&self) -> &DataAggregator {
        &self.aggregator
    }

    pub fn map(&self) -> &MapLayerManager {
        &self.map
    }

    /// Issue a new load for the current filters and show the loading
    /// indicator. Any load issued earlier becomes stale.
    pub fn begin_load(&mut self) -> PendingLoad {
        self.sink.set_loading(true);
        PendingLoad {
            ticket: self.sequencer.issue(),
            filters: self.filters,
            aggregator: self.aggregator.clone(),
        }
    }

    /// Apply the result of a load if it is still the latest one.
    ///
    /// The loading indicator is hidden only when the latest load completes;
    /// a stale completion leaves it to the load still in flight.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Snapshot, LoadError>,
    ) -> LoadDisposition {
        if !self.sequencer.is_current(ticket) {
            tracing::debug!("Discarding stale load {:?}", ticket);
            return LoadDisposition::Stale;
        }
        self.sink.set_loading(false);

        match result {
            Ok(snapshot) => {
                self.apply_snapshot(&snapshot);
                LoadDisposition::Applied
            }
            Err(e) => {
                tracing::error!("Dashboard load failed: {}", e);
                let LoadError::BackendUnreachable { first, .. } = &e;
                self.apply_snapshot(&Snapshot::unavailable(first));
                self.sink.alert(UNREACHABLE_ALERT);
                LoadDisposition::Failed
            }
        }
    }

    pub fn finish_load(&mut self, done: CompletedLoad) -> LoadDisposition {
        self.complete_load(done.ticket, done.result)
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.coordinator.render(snapshot, self.sink.as_ref());
        self.map
            .set_data(snapshot.cluster_points(), snapshot.flow_edges());
        self.map.redraw(self.surface.as_ref());
    }

    /// Full load cycle for the current filters.
    pub async fn reload(&mut self) -> LoadDisposition {
        let done = self.begin_load().fetch().await;
        self.finish_load(done)
    }

    /// Startup: liveness probe, then a full load.
    pub async fn initial_load(&mut self) -> LoadDisposition {
        match self.aggregator.client().health().await {
            Ok(status) => tracing::info!("API health: {}", status),
            Err(e) => tracing::warn!("API health check failed: {}", e),
        }
        self.reload().await
    }

    /// Replace the filters wholesale and reload.
    pub async fn apply_filters(
        &mut self,
        day_of_week: Option<Weekday>,
        hour_start: Option<u8>,
        hour_end: Option<u8>,
    ) -> LoadDisposition {
        self.filters = FilterState::new(day_of_week, hour_start, hour_end);
        tracing::info!("Filters applied: {}", self.filters);
        self.reload().await
    }

    /// Clear every filter and reload.
    pub async fn reset_filters(&mut self) -> LoadDisposition {
        self.filters = FilterState::unconstrained();
        tracing::info!("Filters reset");
        self.reload().await
    }

    pub fn toggle_layer(&mut self, layer: MapLayer) -> LayerState {
        self.map.toggle(layer, self.surface.as_ref())
    }

    fn refreshes(&mut self, widget: Widget) -> &mut LoadSequencer {
        match widget {
            Widget::Charts => &mut self.chart_refreshes,
            Widget::Analytics => &mut self.analytics_refreshes,
        }
    }

    /// Issue a refresh of one widget for the current filters. Does not touch
    /// the loading indicator.
    pub fn begin_refresh(&mut self, widget: Widget) -> PendingRefresh {
        let issued_under = self.sequencer.latest();
        let ticket = self.refreshes(widget).issue();
        PendingRefresh {
            ticket: RefreshTicket {
                widget,
                ticket,
                issued_under,
            },
            filters: self.filters,
            aggregator: self.aggregator.clone(),
        }
    }

    /// Redraw the refreshed widget unless a newer refresh of it or a newer
    /// full load was issued meanwhile. Never alerts.
    pub fn finish_refresh(&mut self, done: CompletedRefresh) -> LoadDisposition {
        let RefreshTicket {
            widget,
            ticket,
            issued_under,
        } = done.ticket;
        if self.sequencer.latest() != issued_under || !self.refreshes(widget).is_current(ticket) {
            tracing::debug!("Discarding stale {:?} refresh {:?}", widget, ticket);
            return LoadDisposition::Stale;
        }

        match &done.sections {
            RefreshSections::Charts(charts) => {
                self.coordinator.render_charts(charts, self.sink.as_ref())
            }
            RefreshSections::Analytics(analytics) => {
                render_analytics(analytics, self.sink.as_ref())
            }
        }
        LoadDisposition::Applied
    }

    /// Re-fetch and redraw only the two charts.
    pub async fn refresh_charts(&mut self) -> LoadDisposition {
        let done = self.begin_refresh(Widget::Charts).fetch().await;
        self.finish_refresh(done)
    }

    /// Re-fetch and redraw only the analytics panel.
    pub async fn refresh_analytics(&mut self) -> LoadDisposition {
        let done = self.begin_refresh(Widget::Analytics).fetch().await;
        self.finish_refresh(done)
    }
}
