//! Data aggregator: fans out every query needed for one view concurrently
//! and assembles the results into a [`Snapshot`].
//!
//! Each endpoint is awaited independently. A failed endpoint becomes an
//! `Err` section of the snapshot and never aborts its siblings.

use thiserror::Error;

use crate::{
    api::{AnalyticsApiClient, FetchError},
    config::QueryConfig,
    filters::{Endpoint, FilterState},
    models::{
        BusiestHour, ClusterPoint, ClusterRanking, DailyPatterns, FlowEdge, HourlyDistribution,
        HourlyPickups, PickupClusters, SortedTrips, SummaryOverview, TopFlows,
    },
};

/// Outcome of a single endpoint within a load cycle.
pub type Section<T> = Result<T, FetchError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("All {failed} dashboard queries failed, first error: {first}")]
    BackendUnreachable { failed: usize, first: FetchError },
}

/// Sections feeding the two bar charts.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSections {
    pub hourly: Section<HourlyDistribution>,
    pub daily: Section<DailyPatterns>,
}

/// Sections feeding the analytics panel.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSections {
    pub busiest_hour: Section<BusiestHour>,
    pub cluster_ranking: Section<ClusterRanking>,
    pub sorted_trips: Section<SortedTrips>,
    pub hourly_pickups: Section<HourlyPickups>,
}

/// Every per-endpoint result of one load cycle. Replaced, never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub summary: Section<SummaryOverview>,
    pub charts: ChartSections,
    pub analytics: AnalyticsSections,
    pub clusters: Section<Vec<ClusterPoint>>,
    pub flows: Section<Vec<FlowEdge>>,
}

impl ChartSections {
    fn errors(&self) -> impl Iterator<Item = &FetchError> {
        [self.hourly.as_ref().err(), self.daily.as_ref().err()]
            .into_iter()
            .flatten()
    }
}

impl AnalyticsSections {
    fn errors(&self) -> impl Iterator<Item = &FetchError> {
        [
            self.busiest_hour.as_ref().err(),
            self.cluster_ranking.as_ref().err(),
            self.sorted_trips.as_ref().err(),
            self.hourly_pickups.as_ref().err(),
        ]
        .into_iter()
        .flatten()
    }
}

impl Snapshot {
    /// A snapshot in which every section failed with `error`.
    pub fn unavailable(error: &FetchError) -> Self {
        Self {
            summary: Err(error.clone()),
            charts: ChartSections {
                hourly: Err(error.clone()),
                daily: Err(error.clone()),
            },
            analytics: AnalyticsSections {
                busiest_hour: Err(error.clone()),
                cluster_ranking: Err(error.clone()),
                sorted_trips: Err(error.clone()),
                hourly_pickups: Err(error.clone()),
            },
            clusters: Err(error.clone()),
            flows: Err(error.clone()),
        }
    }

    pub fn errors(&self) -> Vec<&FetchError> {
        [self.summary.as_ref().err()]
            .into_iter()
            .flatten()
            .chain(self.charts.errors())
            .chain(self.analytics.errors())
            .chain(self.clusters.as_ref().err())
            .chain(self.flows.as_ref().err())
            .collect()
    }

    pub fn section_count() -> usize {
        Endpoint::ALL.len()
    }

    pub fn all_failed(&self) -> bool {
        self.errors().len() == Self::section_count()
    }

    /// Cluster points to draw; empty when the section failed.
    pub fn cluster_points(&self) -> Vec<ClusterPoint> {
        self.clusters.clone().unwrap_or_default()
    }

    pub fn flow_edges(&self) -> Vec<FlowEdge> {
        self.flows.clone().unwrap_or_default()
    }
}

fn logged<T>(section: Section<T>) -> Section<T> {
    if let Err(e) = &section {
        tracing::warn!("Section failed: {}", e);
    }
    section
}

/// Issues the dashboard's queries against one API client.
#[derive(Debug, Clone)]
pub struct DataAggregator {
    client: AnalyticsApiClient,
    queries: QueryConfig,
}

impl DataAggregator {
    pub fn new(client: AnalyticsApiClient, queries: QueryConfig) -> Self {
        Self { client, queries }
    }

    pub fn client(&self) -> &AnalyticsApiClient {
        &self.client
    }

    async fn section<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        filters: &FilterState,
    ) -> Section<T> {
        let params = endpoint.params(filters, &self.queries);
        logged(self.client.fetch(endpoint, &params).await)
    }

    /// Hourly distribution and daily patterns, fetched concurrently.
    pub async fn load_charts(&self, filters: &FilterState) -> ChartSections {
        let (hourly, daily) = tokio::join!(
            self.section::<HourlyDistribution>(Endpoint::HourlyDistribution, filters),
            self.section::<DailyPatterns>(Endpoint::DailyPatterns, filters),
        );
        ChartSections { hourly, daily }
    }

    /// The four analytics panel sections, fetched concurrently.
    pub async fn load_analytics(&self, filters: &FilterState) -> AnalyticsSections {
        let (busiest_hour, cluster_ranking, sorted_trips, hourly_pickups) = tokio::join!(
            self.section::<BusiestHour>(Endpoint::BusiestHour, filters),
            self.section::<ClusterRanking>(Endpoint::ClusterRanking, filters),
            self.section::<SortedTrips>(Endpoint::TripSorting, filters),
            self.section::<HourlyPickups>(Endpoint::HourlyPickups, filters),
        );
        AnalyticsSections {
            busiest_hour,
            cluster_ranking,
            sorted_trips,
            hourly_pickups,
        }
    }

    /// Load every section for `filters`.
    ///
    /// Fails only when no section at all could be loaded; any partial
    /// failure is carried inside the snapshot.
    pub async fn load_all(&self, filters: &FilterState) -> Result<Snapshot, LoadError> {
        let filters = *filters;
        tracing::info!("Loading dashboard for {}", filters);

        let (summary, charts, analytics, clusters, flows) = tokio::join!(
            self.section::<SummaryOverview>(Endpoint::SummaryOverview, &filters),
            self.load_charts(&filters),
            self.load_analytics(&filters),
            self.section::<PickupClusters>(Endpoint::PickupClusters, &filters),
            self.section::<TopFlows>(Endpoint::TopFlows, &filters),
        );

        let snapshot = Snapshot {
            summary,
            charts,
            analytics,
            clusters: clusters.map(|c| c.into_points()),
            flows: flows.map(|f| f.flows),
        };

        let errors = snapshot.errors();
        if snapshot.all_failed() {
            let first = errors[0].clone();
            tracing::error!("Every dashboard query failed: {}", first);
            return Err(LoadError::BackendUnreachable {
                failed: errors.len(),
                first,
            });
        }
        if !errors.is_empty() {
            tracing::warn!(
                "{} of {} sections failed to load",
                errors.len(),
                Snapshot::section_count()
            );
        }
        Ok(snapshot)
    }
}
