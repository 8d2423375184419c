//! Page decoding: gunzip → JSON array → header + records

use std::io::Read;

use flate2::read::GzDecoder;
use harvest_core::PageError;
use serde::Deserialize;

use crate::record::Record;

/// Element 0 of every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageHeader {
    /// Total records matching the query, across all pages
    pub allcount: u64,
}

/// A decoded response body
#[derive(Debug)]
pub struct DecodedPage {
    pub header: Option<PageHeader>,
    /// Catalog records, header excluded, in response order
    pub records: Vec<Record>,
    /// Number of array elements received, header included
    pub returned_len: usize,
}

/// Decompress a gzip body
pub fn gunzip(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(raw.len() * 8);
    GzDecoder::new(raw).read_to_end(&mut body)?;
    Ok(body)
}

/// Decode one raw page. Element 0 is always discarded as the header, even
/// when it does not parse as one.
pub fn decode_page(raw: &[u8]) -> Result<DecodedPage, PageError> {
    let body = gunzip(raw)?;
    let items: Vec<serde_json::Value> =
        serde_json::from_slice(&body).map_err(|e| PageError::Decode(e.to_string()))?;
    let returned_len = items.len();

    let mut items = items.into_iter();
    let header = items
        .next()
        .and_then(|v| serde_json::from_value::<PageHeader>(v).ok());
    let records = items
        .enumerate()
        .map(|(i, v)| {
            serde_json::from_value::<Record>(v)
                .map_err(|e| PageError::Decode(format!("record {}: {e}", i + 1)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedPage {
        header,
        records,
        returned_len,
    })
}
