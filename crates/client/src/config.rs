//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CRUMB_API_URL` - Base URL of the bakery REST API (e.g. `https://api.example.com/api/`)
//!
//! ## Optional
//! - `CRUMB_STATE_DIR` - Directory for persisted session and cart (default: `.crumb`)
//! - `CRUMB_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `CRUMB_CATALOG_TTL_SECS` - Product/offer listing cache lifetime (default: 300)
//! - `CRUMB_POLL_INTERVAL_SECS` - Order polling interval (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STATE_DIR: &str = ".crumb";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Hosts allowed to be reached over plain HTTP.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure API URL {0}: bearer tokens must not travel over plain HTTP")]
    InsecureApiUrl(String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, always ending in `/`
    pub api_url: Url,
    /// Where the file-backed store keeps session and cart data
    pub state_dir: PathBuf,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Lifetime of cached product and offer listings
    pub catalog_ttl: Duration,
    /// Interval between order polls
    pub poll_interval: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Build a configuration for `api_url` with every optional setting at
    /// its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or is insecure.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url("CRUMB_API_URL", api_url)?,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("CRUMB_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("CRUMB_API_URL".to_string()))?;
        let mut config = Self::new(&raw_url)?;

        if let Some(dir) = lookup("CRUMB_STATE_DIR").filter(|d| !d.trim().is_empty()) {
            config.state_dir = PathBuf::from(dir);
        }
        config.http_timeout = seconds(&lookup, "CRUMB_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        config.catalog_ttl = seconds(&lookup, "CRUMB_CATALOG_TTL_SECS", DEFAULT_CATALOG_TTL_SECS)?;
        config.poll_interval =
            seconds(&lookup, "CRUMB_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        config.sentry_dsn = lookup("SENTRY_DSN");
        config.sentry_environment = lookup("SENTRY_ENVIRONMENT");

        Ok(config)
    }

    /// Path of the file-backed store inside the state directory.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.state_dir.join("storage.json")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, normalizing the trailing slash so that relative
/// joins (`products/3`) stay under the base path.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    match url.scheme() {
        "https" => {}
        "http" => {
            let host = url.host_str().unwrap_or_default();
            if !LOOPBACK_HOSTS.contains(&host) {
                return Err(ConfigError::InsecureApiUrl(raw.to_string()));
            }
        }
        other => {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("unsupported scheme '{other}'"),
            ));
        }
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Read a positive number of seconds, falling back to `default`.
fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}
