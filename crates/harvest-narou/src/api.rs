//! Narou API client

use chrono::{DateTime, Utc};
use harvest_core::{StreamError, fetch_bytes};

/// `of` selector: the 17 fields a [`crate::Record`] is built from
pub const FIELD_SELECTOR: &str = "n-u-g-gf-gl-nt-e-ga-l-its-iti-gp-f-imp-r-a-ah";

/// One page request: a `lastup` window, an offset and the page shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub lower: DateTime<Utc>,
    pub upper: DateTime<Utc>,
    pub offset: usize,
    pub page_size: usize,
    pub gzip_level: u8,
}

impl PageQuery {
    /// Request URL, oldest-first within the `lastup` window.
    ///
    /// `st` is only sent for non-zero offsets.
    pub fn url(&self, endpoint: &str) -> String {
        let mut url = format!(
            "{endpoint}?gzip={}&out=json&of={FIELD_SELECTOR}&lim={}&order=old&lastup={}-{}",
            self.gzip_level,
            self.page_size,
            self.lower.timestamp(),
            self.upper.timestamp()
        );
        if self.offset > 0 {
            url.push_str(&format!("&st={}", self.offset));
        }
        url
    }
}

/// Where raw (still compressed) page bodies come from
pub trait PageSource {
    fn fetch(&mut self, query: &PageQuery) -> Result<Vec<u8>, StreamError>;
}

impl<S: PageSource + ?Sized> PageSource for &mut S {
    fn fetch(&mut self, query: &PageQuery) -> Result<Vec<u8>, StreamError> {
        (**self).fetch(query)
    }
}

/// Live source backed by the shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    endpoint: String,
}

impl HttpPageSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl PageSource for HttpPageSource {
    fn fetch(&mut self, query: &PageQuery) -> Result<Vec<u8>, StreamError> {
        let url = query.url(&self.endpoint);
        log::debug!("GET {url}");
        fetch_bytes(&url)
    }
}
