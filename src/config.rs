use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub network: NetworkConfig,
    pub queries: QueryConfig,
    pub map: MapConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Server root, without the API prefix (the health probe lives here).
    pub server_url: String,
    pub api_prefix: String,
}

impl ApiConfig {
    /// Base URL every analytics endpoint is resolved against.
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Fixed parameters sent alongside the filter fields.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    pub pickup_clusters: u32,
    pub ranked_clusters: u32,
    pub flow_limit: u32,
    pub trip_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            pickup_clusters: 8,
            ranked_clusters: 5,
            flow_limit: 15,
            trip_limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 40.7128,
            center_lon: -74.0060,
            zoom: 12,
        }
    }
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
    let builder = Config::builder()
        // Api
        .set_default("api.server_url", "http://localhost:8000")?
        .set_default("api.api_prefix", "/api/v1")?
        // Network
        .set_default("network.request_timeout_secs", 30)?
        .set_default("network.connect_timeout_secs", 10)?
        // Queries
        .set_default("queries.pickup_clusters", 8)?
        .set_default("queries.ranked_clusters", 5)?
        .set_default("queries.flow_limit", 15)?
        .set_default("queries.trip_limit", 10)?
        // Map
        .set_default("map.center_lat", 40.7128)?
        .set_default("map.center_lon", -74.0060)?
        .set_default("map.zoom", 12)?;
    Ok(builder)
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taxi-dashboard");

        let builder = with_defaults()?
            // Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // Environment variables (TAXIDASH__API__SERVER_URL=...)
            .add_source(Environment::with_prefix("TAXIDASH").separator("__"));

        let s = builder.build().context("Failed to build configuration")?;
        Ok(s.try_deserialize()?)
    }

    /// Load defaults overlaid with a single, required config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // ==================== Default Value Tests ====================

    #[test]
    fn test_network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_query_config_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.pickup_clusters, 8);
        assert_eq!(config.ranked_clusters, 5);
        assert_eq!(config.flow_limit, 15);
        assert_eq!(config.trip_limit, 10);
    }

    #[test]
    fn test_map_config_defaults_point_at_manhattan() {
        let config = MapConfig::default();
        assert_eq!(config.center_lat, 40.7128);
        assert_eq!(config.center_lon, -74.0060);
        assert_eq!(config.zoom, 12);
    }

    #[test]
    fn test_api_base_url_joins_prefix() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8000/api/v1");
    }

    #[test]
    fn test_api_base_url_tolerates_slashes() {
        let config = ApiConfig {
            server_url: "http://example.com/".to_string(),
            api_prefix: "api/v2/".to_string(),
        };
        assert_eq!(config.base_url(), "http://example.com/api/v2");
    }

    // ==================== Config Loading Tests ====================

    #[test]
    fn test_config_load_with_defaults() {
        let config = AppConfig::load().expect("Config should load");
        assert!(!config.api.server_url.is_empty());
        assert!(config.network.request_timeout_secs > 0);
        assert!(config.queries.pickup_clusters > 0);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "[api]\nserver_url = \"http://analytics.internal:9000\"\n\n[queries]\nflow_limit = 40"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).expect("Config should load");

        assert_eq!(config.api.server_url, "http://analytics.internal:9000");
        assert_eq!(config.api.api_prefix, "/api/v1");
        assert_eq!(config.queries.flow_limit, 40);
        assert_eq!(config.queries.trip_limit, 10);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_from(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    // ==================== Environment Variable Override Tests ====================

    /// Helper to set and remove an environment variable around a closure.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: Test environment, variable is unique to this test
        unsafe {
            std::env::set_var(key, value);
        }
        let result = f();
        unsafe {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_env_var_overrides_network_timeout() {
        let config = with_env_var("TAXIDASH__NETWORK__REQUEST_TIMEOUT_SECS", "120", || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(config.network.request_timeout_secs, 120);
    }
}
