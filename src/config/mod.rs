//! Tracker Configuration Module
//!
//! Provides pipeline configuration loaded from TOML files, replacing
//! hardcoded feed parameters with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. Explicit path passed to [`TrackerConfig::load`]
//! 2. `SEAWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `seawatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The credential and endpoint can additionally be overridden via the
//! `AIS_API_KEY` and `AIS_STREAM_ENDPOINT` environment variables, which take
//! precedence over TOML fields.
//!
//! The loaded config is an explicit value passed into the pipeline — there is
//! no process-wide singleton, so tests can run multiple independent
//! instances with different caps.

pub mod defaults;

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::FeedError;

/// Operator-tunable pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Upstream feed WebSocket URL. `None` means no reachable endpoint is
    /// derivable and the pipeline runs on simulated data.
    pub endpoint: Option<String>,

    /// Feed credential, passed through in the subscription handshake.
    /// Absence is an expected deployment mode (simulated data), not an error.
    pub credential: Option<String>,

    /// Snapshot publish interval in milliseconds, clamped to
    /// [`MIN_UPDATE_INTERVAL_MS`](defaults::MIN_UPDATE_INTERVAL_MS)..=
    /// [`MAX_UPDATE_INTERVAL_MS`](defaults::MAX_UPDATE_INTERVAL_MS).
    pub update_interval_ms: u64,

    /// Base reconnect delay in milliseconds; doubles per attempt.
    pub retry_base_ms: u64,

    /// Confirmed-set cap.
    pub max_confirmed: usize,

    /// Staging-area cap.
    pub max_staged: usize,

    /// Per-vessel track history cap.
    pub max_track_points: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(defaults::DEFAULT_ENDPOINT.to_string()),
            credential: None,
            update_interval_ms: defaults::DEFAULT_UPDATE_INTERVAL_MS,
            retry_base_ms: defaults::DEFAULT_RETRY_BASE_MS,
            max_confirmed: defaults::DEFAULT_MAX_CONFIRMED,
            max_staged: defaults::DEFAULT_MAX_STAGED,
            max_track_points: defaults::DEFAULT_MAX_TRACK_POINTS,
        }
    }
}

impl TrackerConfig {
    /// Load configuration following the documented precedence order, then
    /// apply environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, FeedError> {
        let mut config = match Self::config_path(explicit_path) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    FeedError::Configuration(format!(
                        "failed to read config {}: {e}",
                        path.display()
                    ))
                })?;
                let parsed: Self = toml::from_str(&raw).map_err(|e| {
                    FeedError::Configuration(format!(
                        "invalid config {}: {e}",
                        path.display()
                    ))
                })?;
                tracing::info!(path = %path.display(), "Loaded tracker config");
                parsed
            }
            None => {
                tracing::info!("No config file found — using built-in defaults");
                Self::default()
            }
        };

        if let Ok(key) = std::env::var("AIS_API_KEY") {
            if !key.trim().is_empty() {
                config.credential = Some(key);
            }
        }
        if let Ok(endpoint) = std::env::var("AIS_STREAM_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.endpoint = Some(endpoint);
            }
        }

        Ok(config)
    }

    /// Publish interval, clamped to the supported range.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(clamp_interval_ms(self.update_interval_ms))
    }

    /// Base reconnect delay.
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    fn config_path(explicit: Option<&Path>) -> Option<std::path::PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("SEAWATCH_CONFIG") {
            return Some(std::path::PathBuf::from(p));
        }
        let cwd = Path::new("seawatch.toml");
        if cwd.exists() {
            return Some(cwd.to_path_buf());
        }
        None
    }
}

/// Clamp a requested publish interval into the supported range.
pub fn clamp_interval_ms(requested: u64) -> u64 {
    requested.clamp(
        defaults::MIN_UPDATE_INTERVAL_MS,
        defaults::MAX_UPDATE_INTERVAL_MS,
    )
}
