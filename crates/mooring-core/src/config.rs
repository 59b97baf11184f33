//! Dashboard configuration.
//!
//! All tunables live in one struct, read once at startup. Environment
//! variables override the built-in defaults; everything can also be set
//! programmatically (tests construct configs pointing at temp dirs).
//!
//! | Variable                | Meaning                          |
//! |-------------------------|----------------------------------|
//! | `MOORING_API_URL`       | Base URL of the backend API      |
//! | `MOORING_FALLBACK_URLS` | Comma-separated reachability URLs|
//! | `MOORING_DATA_DIR`      | Root directory for durable tiers |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::paths::default_data_dir;

/// Default base URL when `MOORING_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Default reachability probe targets, tried in order.
pub const DEFAULT_FALLBACK_URLS: [&str; 3] = [
    "https://www.google.com/generate_204",
    "https://cloudflare.com/cdn-cgi/trace",
    "https://httpbin.org/status/204",
];

/// Configuration for the persistence core.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL of the backend API (no trailing slash).
    pub api_base_url: String,
    /// External endpoints probed to answer "are we online".
    pub fallback_urls: Vec<String>,
    /// Root directory for the durable storage tiers.
    pub data_dir: PathBuf,

    /// Storage key for the projects collection.
    pub projects_key: String,
    /// Storage key for the auth token.
    pub token_key: String,
    /// Storage key for dashboard preferences.
    pub prefs_key: String,
    /// Storage key for the mirrored API health status.
    pub health_key: String,

    /// How long a cached health result stays fresh.
    pub health_ttl: Duration,
    /// Base delay of the health-check backoff schedule.
    pub backoff_base: Duration,
    /// Ceiling of the health-check backoff schedule.
    pub backoff_cap: Duration,
    /// Per-attempt timeout for API requests.
    pub request_timeout: Duration,
    /// Timeout for connectivity probes.
    pub probe_timeout: Duration,
    /// Extra attempts after the first failed API list request.
    pub fetch_retries: u32,
    /// Number of placeholder projects synthesized when every tier is empty.
    pub placeholder_count: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            fallback_urls: DEFAULT_FALLBACK_URLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            data_dir: default_data_dir(),
            projects_key: "projects".to_string(),
            token_key: "auth_token".to_string(),
            prefs_key: "dashboard_prefs".to_string(),
            health_key: "api_health".to_string(),
            health_ttl: Duration::from_secs(30),
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
            fetch_retries: 2,
            placeholder_count: 3,
        }
    }
}

impl DashboardConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("MOORING_API_URL") {
            if !url.is_empty() {
                config.api_base_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(urls) = env::var("MOORING_FALLBACK_URLS") {
            let parsed: Vec<String> = urls
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.fallback_urls = parsed;
            }
        }

        if let Ok(dir) = env::var("MOORING_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        config
    }

    /// Full URL of the project list endpoint.
    pub fn projects_url(&self) -> String {
        format!("{}/projects", self.api_base_url)
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.api_base_url)
    }
}
