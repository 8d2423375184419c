//! Harvest Core - Common infrastructure for catalog harvesting pipelines
//!
//! This crate provides the source-agnostic pieces: a shared HTTP client,
//! page error classification, retry backoff, sharded TSV output and
//! logging/progress setup.

pub mod error;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod sink;
pub mod stream;

// Re-exports for convenience
pub use error::PageError;
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{backoff_duration, retry_with_backoff};
pub use sink::{ShardLayout, TsvSink, ensure_dir, write_archive};
pub use stream::{SHARED_RUNTIME, StreamError, fetch_bytes, http_client};
