//! Common error type for page fetching

use crate::stream::StreamError;

/// Error from fetching and decoding a single page.
///
/// Wraps a network/HTTP error ([`StreamError`]), a local I/O error raised
/// while decompressing, or a payload that does not have the expected shape.
#[derive(Debug)]
pub enum PageError {
    Stream(StreamError),
    Io(std::io::Error),
    Decode(String),
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
        }
    }
}

impl std::error::Error for PageError {}

impl From<StreamError> for PageError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<std::io::Error> for PageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl PageError {
    /// Whether fetching the same page again could succeed.
    ///
    /// A truncated gzip body surfaces as `UnexpectedEof` and is worth another
    /// request; a well-formed body with the wrong shape is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_retryable(),
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Self::Decode(_) => false,
        }
    }
}
