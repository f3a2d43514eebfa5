//! Configuration management for `topsky-core`.
//!
//! Settings are read from YAML (embedded defaults, then an optional user file) and
//! finally overlaid with environment variables for the values that are usually
//! deployment secrets: the Newsky API key, the API base URL and the MongoDB URI.
//!
//! License: MIT OR Apache-2.0

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_KEY: &str = "NEWSKY_API_KEY";
pub const ENV_BASE_URL: &str = "NEWSKY_BASE_URL";
pub const ENV_MONGODB_URI: &str = "MONGODB_URI";

/// Connection settings for the Newsky airline API.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NewskyConfig {
    pub base_url: String,
    /// Bearer token. Usually supplied through `NEWSKY_API_KEY`.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl fmt::Debug for NewskyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewskyConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for NewskyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsky.app/api/airline-api".to_string(),
            api_key: None,
            request_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mongodb_uri: String,
    /// Overrides the database named in the URI.
    pub database: Option<String>,
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017/topsky".to_string(),
            database: None,
            collection: "flights".to_string(),
        }
    }
}

/// Timing and paging knobs for polling and backfills.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    /// Records requested per poll tick.
    pub poll_count: u32,
    /// Width of the trailing window requested by each poll tick.
    pub recent_window_hours: u32,
    pub backfill_window_days: u32,
    pub backfill_page_size: u32,
    /// Pause between consecutive backfill requests (upstream rate limit).
    pub backfill_request_delay_secs: u64,
    /// Number of status lines kept in memory.
    pub log_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            poll_count: 50,
            recent_window_hours: 24,
            backfill_window_days: 1,
            backfill_page_size: 100,
            backfill_request_delay_secs: 10,
            log_capacity: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backfill_request_delay(&self) -> Duration {
        Duration::from_secs(self.backfill_request_delay_secs)
    }
}

/// Inputs to the VATSIM heuristic.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VatsimConfig {
    /// Free-text keywords, matched case-insensitively.
    pub keywords: Vec<String>,
    /// Airline ICAO prefixes whose callsigns count as network flights.
    pub airline_prefixes: Vec<String>,
    /// Minimum `network.ratio` for a flight to count as confirmed.
    pub confirmed_ratio: f64,
}

impl Default for VatsimConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["vatsim".to_string()],
            airline_prefixes: ["TOP", "DLH", "BAW", "RYR", "UAE", "AAL", "AFR"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            confirmed_ratio: 0.999,
        }
    }
}

/// Represents the top-level configuration structure for Topsky.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub newsky: NewskyConfig,
    pub storage: StorageConfig,
    pub sync: SchedulerConfig,
    pub vatsim: VatsimConfig,
}

impl SyncConfig {
    /// Loads a configuration from a YAML file. Missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SyncConfig = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration shipped inside the crate.
    pub fn load_default() -> Result<Self> {
        debug!("Loading default configuration from embedded string...");
        let default_yaml = include_str!("../config/default_config.yaml");
        serde_yml::from_str(default_yaml).context("Failed to parse default configuration")
    }

    /// Resolves the effective configuration: explicit file, else the per-user file if it
    /// exists, else the embedded defaults; then environment overrides; then validation.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match user_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::load_default()?,
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlays values from a key lookup (normally the process environment).
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            debug!("Using Newsky API key from {}", ENV_API_KEY);
            self.newsky.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            debug!("Overriding Newsky base URL with {}", url);
            self.newsky.base_url = url;
        }
        if let Some(uri) = get(ENV_MONGODB_URI) {
            debug!("Using MongoDB URI from {}", ENV_MONGODB_URI);
            self.storage.mongodb_uri = uri;
        }
    }

    /// Checks the values that would otherwise fail late (zero periods, empty lists).
    /// A missing API key is not a validation error here; the client reports it when a
    /// sync operation is actually started.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.newsky.base_url.trim().is_empty() {
            errors.push("`newsky.base_url` is empty.".to_string());
        }
        if self.newsky.request_timeout_secs == 0 {
            errors.push("`newsky.request_timeout_secs` must be greater than zero.".to_string());
        }
        if self.storage.collection.trim().is_empty() {
            errors.push("`storage.collection` is empty.".to_string());
        }
        if self.sync.poll_interval_secs == 0 {
            errors.push("`sync.poll_interval_secs` must be greater than zero.".to_string());
        }
        if self.sync.poll_count == 0 {
            errors.push("`sync.poll_count` must be greater than zero.".to_string());
        }
        if self.sync.recent_window_hours == 0 {
            errors.push("`sync.recent_window_hours` must be greater than zero.".to_string());
        }
        if self.sync.backfill_window_days == 0 {
            errors.push("`sync.backfill_window_days` must be greater than zero.".to_string());
        }
        if self.sync.backfill_page_size == 0 {
            errors.push("`sync.backfill_page_size` must be greater than zero.".to_string());
        }
        if self.sync.log_capacity == 0 {
            errors.push("`sync.log_capacity` must be greater than zero.".to_string());
        }
        if self.vatsim.keywords.iter().all(|k| k.trim().is_empty()) {
            errors.push("`vatsim.keywords` needs at least one keyword.".to_string());
        }
        if self.vatsim.airline_prefixes.iter().all(|p| p.trim().is_empty()) {
            errors.push("`vatsim.airline_prefixes` needs at least one prefix.".to_string());
        }
        if !(0.0..=1.0).contains(&self.vatsim.confirmed_ratio) {
            errors.push(format!(
                "`vatsim.confirmed_ratio` must be within 0..=1, got {}.",
                self.vatsim.confirmed_ratio
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Configuration validation failed:\n{}", errors.join("\n")))
        }
    }
}

/// `<config dir>/topsky/config.yaml`, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("topsky").join("config.yaml"))
}
