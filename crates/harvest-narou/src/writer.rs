//! Dataset writer: one TSV row per admitted record

use std::io;
use std::path::Path;

use harvest_core::TsvSink;

use crate::record::Record;

/// Appends record rows to one shard's dataset file.
///
/// Open one per iteration; [`BatchWriter::finish`] flushes and closes it, and
/// dropping it on an early return flushes as well.
#[derive(Debug)]
pub struct BatchWriter {
    sink: TsvSink,
}

impl BatchWriter {
    /// `fresh` truncates the file, otherwise rows are appended
    pub fn open(path: &Path, fresh: bool) -> io::Result<Self> {
        Ok(Self {
            sink: TsvSink::open(path, fresh)?,
        })
    }

    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        self.sink.append_row(&record.to_row())
    }

    /// Rows appended since this writer was opened
    pub fn row_count(&self) -> usize {
        self.sink.row_count()
    }

    pub fn finish(self) -> io::Result<usize> {
        self.sink.finish()
    }
}
