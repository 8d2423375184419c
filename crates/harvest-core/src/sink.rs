//! Output sinks: sharded TSV dataset files and raw-response archives

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Create `path` (and parents) if missing.
///
/// Idempotent: succeeds whether or not the directory already existed.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Maps a run-relative index onto fixed-width shard directories.
///
/// Index `i` lands in the block `[w * (i / w), w * (i / w) + w - 1]`, named
/// by its zero-padded inclusive bounds, e.g. `0200-0399` for width 200.
#[derive(Debug, Clone)]
pub struct ShardLayout {
    root: PathBuf,
    width: usize,
}

impl ShardLayout {
    pub fn new(root: impl Into<PathBuf>, width: usize) -> Self {
        Self {
            root: root.into(),
            width: width.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    /// Inclusive `(first, last)` index bounds of the shard containing `index`
    pub const fn bounds(&self, index: usize) -> (usize, usize) {
        let first = (index / self.width) * self.width;
        (first, first + self.width - 1)
    }

    /// Directory name for the shard containing `index`
    pub fn dir_name(&self, index: usize) -> String {
        let (first, last) = self.bounds(index);
        format!("{first:04}-{last:04}")
    }

    /// Full path of the shard directory containing `index`
    pub fn dir(&self, index: usize) -> PathBuf {
        self.root.join(self.dir_name(index))
    }

    /// Whether `index` is the first index of its shard
    pub const fn starts_shard(&self, index: usize) -> bool {
        index % self.width == 0
    }
}

/// Buffered line-oriented TSV writer.
///
/// Rows are written verbatim followed by `\n`; no header, no quoting. The
/// buffer is flushed by [`TsvSink::finish`], or on drop if the owner bails out
/// early.
pub struct TsvSink {
    writer: BufWriter<File>,
    path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for TsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsvSink")
            .field("path", &self.path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl TsvSink {
    /// Open `path` for writing, truncating it when `truncate` is set and
    /// appending otherwise. The file is created if missing.
    pub fn open(path: &Path, truncate: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .append(!truncate)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            row_count: 0,
        })
    }

    /// Append one row; `row` must not contain the line terminator
    pub fn append_row(&mut self, row: &str) -> io::Result<()> {
        self.writer.write_all(row.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.row_count += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn row_count(&self) -> usize {
        self.row_count
    }

    /// Flush buffered rows and close the file
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.row_count)
    }
}

/// Store a raw response body under `dir` as `name`.
///
/// Written through a `.tmp` sibling and renamed, so a crash never leaves a
/// half-written archive behind.
pub fn write_archive(dir: &Path, name: &str, body: &[u8]) -> io::Result<PathBuf> {
    let final_path = dir.join(name);
    let tmp_path = dir.join(format!("{name}.tmp"));
    fs::write(&tmp_path, body)?;
    fs::rename(&tmp_path, &final_path)?;
    Ok(final_path)
}
