use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    config::{ApiConfig, NetworkConfig},
    filters::{Endpoint, QueryParams},
    models::{
        BusiestHour, ClusterRanking, DailyPatterns, HourlyDistribution, HourlyPickups,
        PickupClusters, SortedTrips, SummaryOverview, TopFlows,
    },
};

/// Failure of a single endpoint call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network error calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },
    #[error("{endpoint} returned HTTP status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

impl FetchError {
    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::Network { endpoint, .. }
            | FetchError::Status { endpoint, .. }
            | FetchError::Malformed { endpoint, .. } => endpoint,
        }
    }
}

/// Read-only client for the taxi analytics API.
#[derive(Clone, Debug)]
pub struct AnalyticsApiClient {
    client: reqwest::Client,
    server_url: String,
    base_url: String,
}

impl AnalyticsApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(api_config: &ApiConfig, network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            server_url: api_config.server_url.trim_end_matches('/').to_string(),
            base_url: api_config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, path: &str, params: &QueryParams) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            .map_err(|e| FetchError::Network {
                endpoint: path.to_string(),
                message: format!("invalid URL: {e}"),
            })?;
        // Only touch the query when there is something to send, otherwise the
        // URL gains a dangling '?'.
        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in params.iter() {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET `path` under the API base and decode the JSON body. Never retries.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<T, FetchError> {
        let url = self.endpoint_url(path, params)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Network {
            endpoint: path.to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// GET a known endpoint and decode its body.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        params: &QueryParams,
    ) -> Result<T, FetchError> {
        self.fetch_json(endpoint.path(), params).await
    }

    /// Fetch overall trip metrics from `summary/overview`.
    pub async fn summary_overview(&self, params: &QueryParams) -> Result<SummaryOverview, FetchError> {
        self.fetch(Endpoint::SummaryOverview, params).await
    }

    /// Fetch the hour with the most pickups.
    pub async fn busiest_hour(&self, params: &QueryParams) -> Result<BusiestHour, FetchError> {
        self.fetch(Endpoint::BusiestHour, params).await
    }

    /// Fetch trip counts per hour of day.
    pub async fn hourly_distribution(
        &self,
        params: &QueryParams,
    ) -> Result<HourlyDistribution, FetchError> {
        self.fetch(Endpoint::HourlyDistribution, params).await
    }

    /// Fetch pickup counts keyed by hour.
    pub async fn hourly_pickups(&self, params: &QueryParams) -> Result<HourlyPickups, FetchError> {
        self.fetch(Endpoint::HourlyPickups, params).await
    }

    /// Fetch trip counts per day of week.
    pub async fn daily_patterns(&self, params: &QueryParams) -> Result<DailyPatterns, FetchError> {
        self.fetch(Endpoint::DailyPatterns, params).await
    }

    /// Fetch clustered pickup hotspots.
    pub async fn pickup_clusters(&self, params: &QueryParams) -> Result<PickupClusters, FetchError> {
        self.fetch(Endpoint::PickupClusters, params).await
    }

    /// Fetch ranked pickup clusters. Durations are in seconds.
    pub async fn cluster_ranking(&self, params: &QueryParams) -> Result<ClusterRanking, FetchError> {
        self.fetch(Endpoint::ClusterRanking, params).await
    }

    /// Fetch the most frequent pickup to dropoff pairs.
    pub async fn top_flows(&self, params: &QueryParams) -> Result<TopFlows, FetchError> {
        self.fetch(Endpoint::TopFlows, params).await
    }

    /// Fetch the longest trips.
    pub async fn sorted_trips(&self, params: &QueryParams) -> Result<SortedTrips, FetchError> {
        self.fetch(Endpoint::TripSorting, params).await
    }

    /// Liveness probe at the server root (outside the API prefix).
    pub async fn health(&self) -> Result<serde_json::Value, FetchError> {
        let endpoint = "health";
        let url = format!("{}/{}", self.server_url, endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::Malformed {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnalyticsApiClient {
        AnalyticsApiClient::new(&ApiConfig::default(), &NetworkConfig::default()).unwrap()
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_api_client_creation() {
        let config = NetworkConfig {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        };
        let result = AnalyticsApiClient::new(&ApiConfig::default(), &config);
        assert!(result.is_ok());
    }

    #[test]
    fn test_base_url_includes_prefix() {
        assert_eq!(client().base_url(), "http://localhost:8000/api/v1");
    }

    // ==================== URL Building Tests ====================

    #[test]
    fn test_url_without_params_has_no_query() {
        let url = client()
            .endpoint_url("summary/overview", &QueryParams::new())
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/summary/overview");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_url_with_params() {
        let params = QueryParams::new().with("limit", 15).with("hour_start", 0);
        let url = client().endpoint_url("flows/top-pairs", &params).unwrap();
        assert_eq!(url.query(), Some("limit=15&hour_start=0"));
    }

    // ==================== FetchError Tests ====================

    #[test]
    fn test_status_error_mentions_code() {
        let err = FetchError::Status {
            endpoint: "flows/top-pairs".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.endpoint(), "flows/top-pairs");
    }
}
