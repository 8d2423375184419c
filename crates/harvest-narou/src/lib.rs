//! Harvest Narou - incremental catalog harvester for the Narou novel API
//!
//! Walks the catalog oldest-first with a `lastup` time window, pages through
//! each window, drops records already seen in the run and appends the rest
//! to sharded TSV files.
//!
//! # Example
//!
//! ```no_run
//! use harvest_narou::{Config, run};
//!
//! let config = Config {
//!     output_dir: "data".into(),
//!     max_iterations: 2,
//!     ..Default::default()
//! };
//!
//! let summary = run(&config).expect("harvest failed");
//! println!("Wrote {} rows ({})", summary.records_written, summary.termination);
//! ```

pub mod api;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod dedup;
pub mod fetcher;
pub mod record;
pub mod runner;
pub mod state;
pub mod writer;

// Re-exports for convenience
pub use api::{HttpPageSource, PageQuery, PageSource};
pub use config::{Config, FetchFailurePolicy};
pub use cursor::{CursorTracker, OrderViolation};
pub use dedup::Deduplicator;
pub use record::Record;
pub use runner::{Harvester, RunSummary, run};
pub use state::{IterationOutcome, Termination};
