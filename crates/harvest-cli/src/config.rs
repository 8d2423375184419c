//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta};
use harvest_narou::FetchFailurePolicy;
use harvest_narou::config::{DEFAULT_ENDPOINT, EPOCH_FLOOR_SECS, JST_CORRECTION_HOURS};
use serde::Deserialize;

/// File-level configuration for narou-harvest
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub api: ApiConfig,
    pub cursor: CursorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub filename: String,
    pub shard_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/tmp/narou"),
            filename: "all.tsv".to_string(),
            shard_width: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub interval_ms: u64,
    pub page_size: usize,
    pub pages_per_iteration: usize,
    pub gzip_level: u8,
    /// "exhausted" or "retry"
    pub on_fetch_error: String,
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            interval_ms: 1000,
            page_size: 500,
            pages_per_iteration: 4,
            gzip_level: 5,
            on_fetch_error: "exhausted".to_string(),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Initial cursor, Unix seconds
    pub epoch_floor: i64,
    pub correction_hours: i64,
    pub max_iterations: usize,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            epoch_floor: EPOCH_FLOOR_SECS,
            correction_hours: JST_CORRECTION_HOURS,
            max_iterations: 18,
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./narou-harvest.toml (current directory)
    /// 2. ~/.config/narou-harvest/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("narou-harvest.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "narou-harvest") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Build the run configuration for the harvester
    pub fn harvest_config(&self) -> Result<harvest_narou::Config> {
        let on_fetch_error = FetchFailurePolicy::from_name(&self.api.on_fetch_error)
            .with_context(|| {
                format!(
                    "Unknown on_fetch_error {:?} (expected \"exhausted\" or \"retry\")",
                    self.api.on_fetch_error
                )
            })?;
        let epoch_floor = DateTime::from_timestamp(self.cursor.epoch_floor, 0)
            .with_context(|| format!("epoch_floor out of range: {}", self.cursor.epoch_floor))?;
        let correction = TimeDelta::try_hours(self.cursor.correction_hours).with_context(|| {
            format!(
                "correction_hours out of range: {}",
                self.cursor.correction_hours
            )
        })?;

        Ok(harvest_narou::Config {
            endpoint: self.api.endpoint.clone(),
            output_dir: self.output.dir.clone(),
            output_filename: self.output.filename.clone(),
            interval: Duration::from_millis(self.api.interval_ms),
            max_iterations: self.cursor.max_iterations,
            page_size: self.api.page_size,
            pages_per_iteration: self.api.pages_per_iteration,
            shard_width: self.output.shard_width,
            epoch_floor,
            correction,
            gzip_level: self.api.gzip_level,
            on_fetch_error,
            max_retries: self.api.max_retries,
        })
    }
}
