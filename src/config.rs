//! Sync Configuration
//!
//! Defaults match the dashboard's built-in constants; every value can be
//! overridden from the environment (a `.env` file is honoured by the binary).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use crate::error::{Result, SyncError};

/// Hard cap of the live event feed
pub const FEED_CAPACITY: usize = 50;
/// Hard cap of simultaneously visible toasts
pub const TOAST_CAPACITY: usize = 5;

/// Runtime configuration for the synchronization layer
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Page origin the dashboard is served from
    pub base_url: String,
    /// Fixed path of the duplex endpoint, relative to the origin
    pub ws_path: String,
    /// Delay before the first reconnection attempt
    pub reconnect_base: Duration,
    /// Upper bound for any single reconnection delay
    pub reconnect_max: Duration,
    /// Scheduled reconnection attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Minimum spacing between two fired alerts
    pub alert_interval: Duration,
    /// User-scoped alert preference file
    pub prefs_file: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ws_path: "/ws".to_string(),
            reconnect_base: Duration::from_millis(1000),
            reconnect_max: Duration::from_millis(30_000),
            max_reconnect_attempts: 10,
            alert_interval: Duration::from_millis(500),
            prefs_file: PathBuf::from("gatekeeper_prefs.json"),
        }
    }
}

impl SyncConfig {
    /// Build a configuration from `GATEKEEPER_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("GATEKEEPER_URL") {
            config.base_url = url;
        }
        if let Ok(path) = std::env::var("GATEKEEPER_WS_PATH") {
            config.ws_path = path;
        }
        if let Some(ms) = env_parse::<u64>("GATEKEEPER_RECONNECT_BASE_MS") {
            config.reconnect_base = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("GATEKEEPER_RECONNECT_MAX_MS") {
            config.reconnect_max = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse::<u32>("GATEKEEPER_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = n;
        }
        if let Some(ms) = env_parse::<u64>("GATEKEEPER_ALERT_INTERVAL_MS") {
            config.alert_interval = Duration::from_millis(ms);
        }
        if let Ok(path) = std::env::var("GATEKEEPER_PREFS_FILE") {
            config.prefs_file = PathBuf::from(path);
        }

        config
    }

    /// Duplex endpoint derived from the page origin: `http` upgrades to
    /// `ws`, `https` to `wss`.
    pub fn ws_url(&self) -> Result<Url> {
        let base = self.http_base()?;
        let scheme = match base.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(SyncError::InvalidUrl(format!("unsupported scheme '{}'", other))),
        };

        let mut url = base
            .join(&self.ws_path)
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        url.set_scheme(scheme)
            .map_err(|_| SyncError::InvalidUrl(format!("cannot switch {} to {}", base, scheme)))?;
        Ok(url)
    }

    /// Parsed page origin, used for the auxiliary HTTP calls
    pub fn http_base(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| SyncError::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}
