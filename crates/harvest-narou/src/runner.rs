//! Harvest orchestration: iterations, rate limiting and termination

use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use harvest_core::{ShardLayout, ensure_dir, fmt_num};
use indicatif::ProgressBar;

use crate::api::{HttpPageSource, PageSource};
use crate::config::Config;
use crate::cursor::CursorTracker;
use crate::dedup::Deduplicator;
use crate::fetcher::PageFetcher;
use crate::record::format_timestamp;
use crate::state::{IterationOutcome, Termination};
use crate::writer::BatchWriter;

/// Fixed delay between consecutive API calls; the first call is free
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    calls: u64,
}

impl RateLimiter {
    pub const fn new(interval: Duration) -> Self {
        Self { interval, calls: 0 }
    }

    /// Block until the next call may go out. Returns whether it slept.
    pub fn wait(&mut self) -> bool {
        let sleep = self.calls > 0 && !self.interval.is_zero();
        if sleep {
            std::thread::sleep(self.interval);
        }
        self.calls += 1;
        sleep
    }
}

/// Counters accumulated over a run
#[derive(Debug, Default, Clone, Copy)]
struct RunStats {
    iterations: usize,
    pages_fetched: usize,
    failed_pages: usize,
    records_received: usize,
    records_written: usize,
}

/// Drives one harvest run over a [`PageSource`].
///
/// Owns the cursor and the [`Deduplicator`]; both live exactly as long as
/// the run.
pub struct Harvester<S> {
    config: Config,
    fetcher: PageFetcher<S>,
    dedup: Deduplicator,
    tracker: CursorTracker,
    limiter: RateLimiter,
    layout: ShardLayout,
    cursor: DateTime<Utc>,
    stats: RunStats,
    progress: ProgressBar,
}

impl<S: PageSource> Harvester<S> {
    /// New run whose `lastup` upper bound is fixed at the current time
    pub fn new(config: Config, source: S) -> Self {
        Self::with_upper_bound(config, source, Utc::now())
    }

    pub fn with_upper_bound(config: Config, source: S, upper: DateTime<Utc>) -> Self {
        let fetcher = PageFetcher::new(source, &config, upper);
        Self {
            dedup: Deduplicator::new(),
            tracker: CursorTracker::new(config.correction),
            limiter: RateLimiter::new(config.interval),
            layout: ShardLayout::new(config.output_dir.clone(), config.shard_width),
            cursor: config.epoch_floor,
            stats: RunStats::default(),
            progress: ProgressBar::hidden(),
            fetcher,
            config,
        }
    }

    /// Report progress on `pb` (e.g. a `ProgressContext::stage_line`)
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = pb;
        self
    }

    pub fn cursor(&self) -> DateTime<Utc> {
        self.cursor
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Run one iteration: every page of the current window, then the cursor
    /// check. The shard file is closed before this returns, on every path.
    ///
    /// Errors are local I/O failures on the dataset; fetch failures are
    /// folded into [`IterationOutcome::TailReached`].
    pub fn step(&mut self, iteration: usize) -> anyhow::Result<IterationOutcome> {
        let shard_dir = self.layout.dir(iteration);
        ensure_dir(&shard_dir)
            .with_context(|| format!("Cannot create shard dir {}", shard_dir.display()))?;
        let path = shard_dir.join(&self.config.output_filename);
        let mut writer = BatchWriter::open(&path, self.layout.starts_shard(iteration))
            .with_context(|| format!("Cannot open {}", path.display()))?;

        let offsets = self.config.offsets();
        let mut maxima = Vec::with_capacity(offsets.len());
        for (k, offset) in offsets.into_iter().enumerate() {
            let page_index = iteration * self.config.pages_per_iteration + k;
            self.limiter.wait();

            let page = self
                .fetcher
                .fetch(self.cursor, offset, page_index, &shard_dir);
            self.stats.pages_fetched += 1;
            if page.result.failed {
                self.stats.failed_pages += 1;
            }
            self.stats.records_received += page.records.len();

            for record in self.dedup.admit(page.records) {
                writer
                    .append(&record)
                    .with_context(|| format!("Cannot write to {}", path.display()))?;
            }
            self.progress.set_message(format!(
                "iteration {iteration}, page {k}, {} rows written",
                fmt_num(self.stats.records_written + writer.row_count())
            ));

            if page.result.new_record_count < self.config.page_size {
                self.close(writer, &path)?;
                return Ok(IterationOutcome::TailReached);
            }
            maxima.push(page.result.max_last_updated_at);
        }
        self.close(writer, &path)?;

        Ok(match self.tracker.advance(self.cursor, &maxima) {
            Ok(next) => IterationOutcome::Continuing(next),
            Err(violation) => IterationOutcome::OrderError(violation),
        })
    }

    fn close(&mut self, writer: BatchWriter, path: &std::path::Path) -> anyhow::Result<()> {
        let rows = writer
            .finish()
            .with_context(|| format!("Cannot flush {}", path.display()))?;
        self.stats.records_written += rows;
        Ok(())
    }

    /// Iterate until the tail, an ordering error or the iteration cap
    pub fn run(mut self) -> anyhow::Result<RunSummary> {
        let start = Instant::now();
        log::info!(
            "Harvesting lastup {} .. {} into {}",
            self.cursor.timestamp(),
            self.fetcher.upper().timestamp(),
            self.layout.root().display()
        );

        let mut iteration = 0;
        let termination = loop {
            if iteration >= self.config.max_iterations {
                break Termination::CapReached;
            }
            let outcome = self.step(iteration)?;
            iteration += 1;
            self.stats.iterations = iteration;
            match outcome {
                IterationOutcome::Continuing(next) => {
                    log::info!(
                        "cursor {} -> {} ({})",
                        self.cursor.timestamp(),
                        next.timestamp(),
                        format_timestamp(&next)
                    );
                    self.cursor = next;
                }
                IterationOutcome::TailReached => break Termination::TailReached,
                IterationOutcome::OrderError(violation) => {
                    log::error!("{violation}");
                    break Termination::OrderError(violation);
                }
            }
        };

        self.progress.finish_and_clear();
        log::info!("finished.");

        let stats = self.stats;
        let summary = RunSummary {
            iterations: stats.iterations,
            pages_fetched: stats.pages_fetched,
            failed_pages: stats.failed_pages,
            records_received: stats.records_received,
            records_written: stats.records_written,
            duplicates_skipped: stats.records_received - stats.records_written,
            final_cursor: self.cursor,
            termination,
            elapsed: start.elapsed(),
        };
        summary.log();
        Ok(summary)
    }
}

/// Run a harvest against the live API
pub fn run(config: &Config) -> anyhow::Result<RunSummary> {
    config.validate()?;
    let source = HttpPageSource::new(&config.endpoint);
    Harvester::new(config.clone(), source).run()
}

/// Summary of a harvest run
#[derive(Debug)]
pub struct RunSummary {
    pub iterations: usize,
    pub pages_fetched: usize,
    /// Pages folded to empty after a transport or decode failure
    pub failed_pages: usize,
    pub records_received: usize,
    pub records_written: usize,
    pub duplicates_skipped: usize,
    /// Cursor after the last successful advance
    pub final_cursor: DateTime<Utc>,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn log(&self) {
        log::info!("=== Harvest Summary ===");
        log::info!(
            "Iterations: {} ({} pages, {} failed)",
            self.iterations,
            self.pages_fetched,
            self.failed_pages
        );
        log::info!(
            "Rows: {} written from {} received ({} duplicates)",
            fmt_num(self.records_written),
            fmt_num(self.records_received),
            fmt_num(self.duplicates_skipped)
        );
        log::info!(
            "Cursor: {} ({})",
            self.final_cursor.timestamp(),
            format_timestamp(&self.final_cursor)
        );
        log::info!("Stopped: {}", self.termination);
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}
