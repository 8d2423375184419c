//! Page fetching: request, archive, decode, and failure folding

use std::path::Path;

use chrono::{DateTime, Utc};
use harvest_core::{PageError, retry_with_backoff, write_archive};

use crate::api::{PageQuery, PageSource};
use crate::config::{Config, FetchFailurePolicy};
use crate::decode::{DecodedPage, decode_page};
use crate::record::{Record, format_timestamp};

/// Outcome of one fetch as the orchestrator sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageResult {
    /// Records on the page, header excluded
    pub new_record_count: usize,
    /// Newest `general_lastup` on the page, or the epoch floor when empty
    pub max_last_updated_at: DateTime<Utc>,
    /// The page could not be fetched or decoded and was folded to empty
    pub failed: bool,
}

/// Records of one page plus its [`PageResult`]
#[derive(Debug)]
pub struct Page {
    pub records: Vec<Record>,
    pub result: PageResult,
}

impl Page {
    fn empty(floor: DateTime<Utc>, failed: bool) -> Self {
        Self {
            records: Vec::new(),
            result: PageResult {
                new_record_count: 0,
                max_last_updated_at: floor,
                failed,
            },
        }
    }
}

/// Fetches pages from a [`PageSource`] under a fixed upper time bound.
///
/// Transport and decode failures never escape `fetch`: they are logged and
/// turned into an empty page, which the orchestrator reads as the tail.
pub struct PageFetcher<S> {
    source: S,
    upper: DateTime<Utc>,
    epoch_floor: DateTime<Utc>,
    page_size: usize,
    gzip_level: u8,
    policy: FetchFailurePolicy,
    max_retries: u32,
}

impl<S: PageSource> PageFetcher<S> {
    /// `upper` is the `lastup` upper bound for every request of the run
    pub fn new(source: S, config: &Config, upper: DateTime<Utc>) -> Self {
        Self {
            source,
            upper,
            epoch_floor: config.epoch_floor,
            page_size: config.page_size,
            gzip_level: config.gzip_level,
            policy: config.on_fetch_error,
            max_retries: config.max_retries,
        }
    }

    pub fn upper(&self) -> DateTime<Utc> {
        self.upper
    }

    /// Fetch the page at `offset` of the window starting at `cursor`.
    ///
    /// The raw body is archived as `result-<page_index>.gz` in `archive_dir`.
    pub fn fetch(
        &mut self,
        cursor: DateTime<Utc>,
        offset: usize,
        page_index: usize,
        archive_dir: &Path,
    ) -> Page {
        let query = PageQuery {
            lower: cursor,
            upper: self.upper,
            offset,
            page_size: self.page_size,
            gzip_level: self.gzip_level,
        };
        log::info!(
            "fetch: page {page_index}, offset {offset}, lastup {}",
            cursor.timestamp()
        );

        let label = format!("page {page_index}");
        let decoded = match self.policy {
            FetchFailurePolicy::Exhausted => self.fetch_once(&query, page_index, archive_dir),
            FetchFailurePolicy::Retry => {
                let max_retries = self.max_retries;
                retry_with_backoff(&label, max_retries, || {
                    self.fetch_once(&query, page_index, archive_dir)
                })
            }
        };

        match decoded {
            Ok(page) => self.resolve(page),
            Err(e) => {
                log::warn!("{label} (offset {offset}) failed: {e}; treating as end of data");
                Page::empty(self.epoch_floor, true)
            }
        }
    }

    fn fetch_once(
        &mut self,
        query: &PageQuery,
        page_index: usize,
        archive_dir: &Path,
    ) -> Result<DecodedPage, PageError> {
        let raw = self.source.fetch(query)?;
        let name = format!("result-{page_index}.gz");
        if let Err(e) = write_archive(archive_dir, &name, &raw) {
            log::warn!("cannot archive {name} in {}: {e}", archive_dir.display());
        }
        decode_page(&raw)
    }

    fn resolve(&self, page: DecodedPage) -> Page {
        let max_last_updated_at = page
            .records
            .iter()
            .map(|r| r.last_updated_at)
            .max()
            .unwrap_or(self.epoch_floor);
        let result = PageResult {
            new_record_count: page.records.len(),
            max_last_updated_at,
            failed: false,
        };
        log::info!(
            "==> count={}, returned={}, allcount={}, max lastup {} ({})",
            result.new_record_count,
            page.returned_len,
            page.header
                .map_or_else(|| "?".to_string(), |h| h.allcount.to_string()),
            format_timestamp(&max_last_updated_at),
            max_last_updated_at.timestamp()
        );
        Page {
            records: page.records,
            result,
        }
    }
}
