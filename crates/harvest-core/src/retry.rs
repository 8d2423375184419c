//! Retry with exponential backoff for page fetches

use std::time::Duration;

use crate::error::PageError;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Retry a fallible page operation with exponential backoff.
///
/// On retryable errors, logs the failure, sleeps and retries up to
/// `max_retries` times. Returns `Ok(T)` on first success, or the final `Err`
/// on exhaustion / non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    max_retries: u32,
    mut attempt_fn: impl FnMut() -> Result<T, PageError>,
) -> Result<T, PageError> {
    retry_with_sleep(label, max_retries, &mut attempt_fn, std::thread::sleep)
}

fn retry_with_sleep<T>(
    label: &str,
    max_retries: u32,
    attempt_fn: &mut impl FnMut() -> Result<T, PageError>,
    mut sleep: impl FnMut(Duration),
) -> Result<T, PageError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                log::warn!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                sleep(backoff_duration(attempt));
            }
            Err(e) => {
                log::error!("{label}: failed permanently: {e}");
                return Err(e);
            }
        }
    }
}
