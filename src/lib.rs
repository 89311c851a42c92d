//! Taxi Dashboard Library
//!
//! Headless orchestration and rendering pipeline for the taxi-trip analytics
//! dashboard: API client, filter state, concurrent data aggregation, and
//! rendering through pluggable sinks.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod filters;
pub mod map;
pub mod models;
pub mod render;
pub mod traits;

// Re-export commonly used types
pub use aggregator::{AnalyticsSections, ChartSections, DataAggregator, LoadError, Section, Snapshot};
pub use api::{AnalyticsApiClient, FetchError};
pub use config::AppConfig;
pub use dashboard::{
    CompletedLoad, CompletedRefresh, Dashboard, LoadDisposition, LoadSequencer, LoadTicket,
    PendingLoad, PendingRefresh, RefreshSections, RefreshTicket, Widget,
};
pub use filters::{Endpoint, FilterState, QueryParams};
pub use map::{LayerState, MapLayer, MapLayerManager, Overlay, OverlayId};
pub use models::{ClusterPoint, FlowEdge, LatLon};
pub use render::{ChartKind, Metric, Panel, PanelContent, RenderCoordinator};
pub use traits::{ConsoleMap, ConsoleSink, DashboardSink, MapSurface, RecordingMap, RecordingSink};
