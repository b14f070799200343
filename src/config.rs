//! Dashboard configuration from environment variables

use crate::analytics::types::MAX_HISTORY_YEARS;
use std::env;
use std::net::SocketAddr;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the dashboard server
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Path to SQLite database file holding the trade tables
    pub db_path: String,

    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,

    /// JSON file carrying the current cache-version stamp
    pub cache_version_path: String,

    /// Number of named buckets kept before rolling up into "Other"
    pub top_n: usize,

    /// Years before the selected year included in trend views
    pub history_years: i32,

    /// Per-query deadline in milliseconds (statement run time and lock waits)
    pub query_timeout_ms: u64,

    /// Directory of idempotent .sql files applied at startup
    pub schema_dir: Option<String>,

    /// Value for the CSP frame-ancestors directive
    pub frame_ancestors: Option<String>,

    /// Build identifier reported by /__version__
    pub build_tag: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            db_path: "comex.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cache_version_path: "cache_version.json".to_string(),
            top_n: 5,
            history_years: 5,
            query_timeout_ms: 5_000,
            schema_dir: None,
            frame_ancestors: None,
            build_tag: "dev".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `COMEX_DB_PATH` (default: comex.db)
    /// - `DASHBOARD_BIND_ADDR` (default: 127.0.0.1:8000)
    /// - `CACHE_VERSION_PATH` (default: cache_version.json)
    /// - `DISTRIBUTION_TOP_N` (default: 5)
    /// - `HISTORY_YEARS` (default: 5, at most 50)
    /// - `QUERY_TIMEOUT_MS` (default: 5000)
    /// - `SCHEMA_DIR` (optional)
    /// - `FRAME_ANCESTORS` (optional)
    /// - `BUILD_TAG` (default: dev-YYYYMMDD-HHMM)
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_raw =
            env::var("DASHBOARD_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "DASHBOARD_BIND_ADDR must be host:port, got '{}'",
                bind_raw
            ))
        })?;

        let top_n = env::var("DISTRIBUTION_TOP_N")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(5);

        Ok(Self {
            db_path: env::var("COMEX_DB_PATH").unwrap_or_else(|_| "comex.db".to_string()),

            bind_addr,

            cache_version_path: env::var("CACHE_VERSION_PATH")
                .unwrap_or_else(|_| "cache_version.json".to_string()),

            top_n,

            history_years: env::var("HISTORY_YEARS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &i32| (0..=MAX_HISTORY_YEARS).contains(n))
                .unwrap_or(5),

            query_timeout_ms: env::var("QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5_000),

            schema_dir: env::var("SCHEMA_DIR").ok().filter(|s| !s.trim().is_empty()),

            frame_ancestors: env::var("FRAME_ANCESTORS")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            build_tag: env::var("BUILD_TAG").unwrap_or_else(|_| {
                chrono::Utc::now().format("dev-%Y%m%d-%H%M").to_string()
            }),
        })
    }
}
