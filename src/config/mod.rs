//! Configuration Management
//!
//! Loads the runtime configuration from TOML files.
//! Configuration includes:
//! - Visitor counter (site id, endpoint, request timeout)
//! - Storage location and translation tables
//! - Orchestrator poll interval and attempt budgets
//! - Uptime epoch and tick interval
//! - Simulated browser environment signals

use crate::errors::HomepageError;
use crate::stats::site_epoch;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_site_id")]
    pub site_id: String,
    /// Base URL of the visitor counter. Without one the counter is offline.
    pub counter_endpoint: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Directory holding `<code>.json` tables. Compiled-in tables otherwise.
    pub translations_dir: Option<PathBuf>,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_i18n_attempts")]
    pub i18n_attempts: u32,
    #[serde(default = "default_module_attempts")]
    pub module_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "site_epoch")]
    pub epoch: DateTime<Utc>,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

/// Signals a browser would provide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub system_dark: bool,
    pub browser_language: Option<String>,
    #[serde(default)]
    pub mobile: bool,
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            counter_endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
            storage_path: default_storage_path(),
            translations_dir: None,
            export_dir: default_export_dir(),
            orchestrator: OrchestratorConfig::default(),
            stats: StatsConfig::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            i18n_attempts: default_i18n_attempts(),
            module_attempts: default_module_attempts(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            system_dark: false,
            browser_language: None,
            mobile: false,
            reduced_motion: false,
            viewport_height: default_viewport_height(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            epoch: site_epoch(),
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_site_id() -> String {
    "nie1037".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("homepage"))
        .unwrap_or_else(|| PathBuf::from(".homepage"))
        .join("storage.json")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_i18n_attempts() -> u32 {
    50
}
fn default_module_attempts() -> u32 {
    10
}
fn default_tick_secs() -> u64 {
    60
}
fn default_viewport_height() -> f64 {
    800.0
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl StatsConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl Config {
    /// Read `path`, or the first default location that exists, falling
    /// back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p.display()))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => {
                let mut default_paths = vec![PathBuf::from("homepage.toml")];
                if let Some(dir) = dirs::config_dir() {
                    default_paths.push(dir.join("homepage").join("config.toml"));
                }

                let mut loaded = None;
                for p in &default_paths {
                    if let Ok(content) = std::fs::read_to_string(p) {
                        debug!(path = %p.display(), "Loading config");
                        loaded = Some(toml::from_str(&content).context("Failed to parse config")?);
                        break;
                    }
                }
                loaded.unwrap_or_else(|| {
                    info!("No config file found, using defaults");
                    Self::default()
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), HomepageError> {
        if self.site_id.trim().is_empty() {
            return Err(HomepageError::Config("site_id must not be empty".into()));
        }
        if self.orchestrator.poll_interval_ms == 0 {
            return Err(HomepageError::Config(
                "orchestrator.poll_interval_ms must be positive".into(),
            ));
        }
        if self.orchestrator.i18n_attempts == 0 || self.orchestrator.module_attempts == 0 {
            return Err(HomepageError::Config(
                "orchestrator attempt budgets must be positive".into(),
            ));
        }
        if self.stats.tick_secs == 0 {
            return Err(HomepageError::Config("stats.tick_secs must be positive".into()));
        }
        let viewport = self.environment.viewport_height;
        if viewport.is_nan() || viewport <= 0.0 {
            return Err(HomepageError::Config(
                "environment.viewport_height must be positive".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(HomepageError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
