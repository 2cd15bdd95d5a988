//! Minimiser configuration types.

use serde::{Deserialize, Serialize};

use crate::types::Region;

/// Top-level minimiser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinimiserConfig {
    /// Root of the Carbon Intensity API (trailing slash required for joins).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Regions queries may be answered for.
    #[serde(default = "default_locations")]
    pub locations: Vec<Region>,

    /// Snapshot cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upstream HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Query server settings for `serve`.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Background snapshot cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, every query hits the upstream API directly.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between the end of one refresh and the start of the next.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Where to write each published snapshot, if anywhere.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

/// Upstream HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Client-side cap on upstream requests per second.
    #[serde(default = "default_requests_per_sec")]
    pub requests_per_sec: u32,
}

/// Query server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_api_base_url() -> String {
    "https://api.carbonintensity.org.uk/".into()
}

fn default_locations() -> Vec<Region> {
    Region::ALL.to_vec()
}

fn default_refresh_interval() -> u64 {
    900
}

fn default_timeout() -> u64 {
    30
}

fn default_requests_per_sec() -> u32 {
    10
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            refresh_interval_secs: default_refresh_interval(),
            snapshot_path: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            requests_per_sec: default_requests_per_sec(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for MinimiserConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            locations: default_locations(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            server: ServerConfig::default(),
        }
    }
}
