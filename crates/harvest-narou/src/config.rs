//! Narou harvest configuration

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Catalog search endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.syosetu.com/novelapi/api/";

/// 2000-01-01T00:00:00Z, the lower bound of the first window
pub const EPOCH_FLOOR_SECS: i64 = 946_684_800;

/// Upstream timestamps are JST written without a zone
pub const JST_CORRECTION_HOURS: i64 = 9;

/// What to do when a page cannot be fetched or decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    /// Fold the failure into an empty page, which ends the run like the tail
    Exhausted,
    /// Retry retryable failures with backoff, then fold into an empty page
    Retry,
}

impl FetchFailurePolicy {
    /// Parse CLI/config string into enum
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "exhausted" => Some(Self::Exhausted),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Retry => "retry",
        }
    }
}

impl std::fmt::Display for FetchFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime configuration for a harvest run
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog API endpoint
    pub endpoint: String,
    /// Root directory for shard directories
    pub output_dir: PathBuf,
    /// Dataset filename inside each shard directory
    pub output_filename: String,
    /// Delay between consecutive API calls
    pub interval: Duration,
    /// Maximum number of iterations (cursor advances) per run
    pub max_iterations: usize,
    /// Records per page (`lim`); a shorter page marks the tail
    pub page_size: usize,
    /// Pages fetched under one cursor before it advances
    pub pages_per_iteration: usize,
    /// Iterations grouped per shard directory
    pub shard_width: usize,
    /// Initial cursor
    pub epoch_floor: DateTime<Utc>,
    /// Subtracted from the newest `general_lastup` to form the next cursor
    pub correction: TimeDelta,
    /// `gzip` level requested from the API
    pub gzip_level: u8,
    pub on_fetch_error: FetchFailurePolicy,
    /// Retry budget per page when `on_fetch_error` is `Retry`
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            output_dir: PathBuf::from("/tmp/narou"),
            output_filename: "all.tsv".to_string(),
            interval: Duration::from_millis(1000),
            max_iterations: 18,
            page_size: 500,
            pages_per_iteration: 4,
            shard_width: 200,
            epoch_floor: DateTime::from_timestamp(EPOCH_FLOOR_SECS, 0).unwrap_or_default(),
            correction: TimeDelta::hours(JST_CORRECTION_HOURS),
            gzip_level: 5,
            on_fetch_error: FetchFailurePolicy::Exhausted,
            max_retries: 3,
        }
    }
}

impl Config {
    /// Start offset (`st`) of page `k` within an iteration.
    ///
    /// The API's `st` is 1-based, so every page after the first skips one
    /// extra record: 0, 501, 1001, 1501 for 500-record pages.
    pub const fn offset(&self, k: usize) -> usize {
        k * self.page_size + if k > 0 { 1 } else { 0 }
    }

    /// All page offsets of one iteration, in fetch order
    pub fn offsets(&self) -> Vec<usize> {
        (0..self.pages_per_iteration).map(|k| self.offset(k)).collect()
    }

    /// Reject configurations the harvest loop cannot make progress with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.page_size > 0, "page_size must be positive");
        anyhow::ensure!(
            self.pages_per_iteration > 0,
            "pages_per_iteration must be positive"
        );
        anyhow::ensure!(self.shard_width > 0, "shard_width must be positive");
        anyhow::ensure!(
            !self.output_filename.is_empty(),
            "output_filename must not be empty"
        );
        anyhow::ensure!(
            (1..=5).contains(&self.gzip_level),
            "gzip_level must be between 1 and 5, got {}",
            self.gzip_level
        );
        Ok(())
    }
}
