//! Cursor advancement and the forward-progress check

use chrono::{DateTime, TimeDelta, Utc};

/// The next cursor would not move past the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderViolation {
    pub current: DateTime<Utc>,
    /// Newest `general_lastup` of the iteration, if any page reported one
    pub candidate: Option<DateTime<Utc>>,
    /// `candidate - correction`
    pub proposed: Option<DateTime<Utc>>,
}

impl std::fmt::Display for OrderViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.candidate, self.proposed) {
            (Some(candidate), Some(proposed)) => write!(
                f,
                "ordering error: next cursor {proposed} (newest lastup {candidate}) \
                 is not after current cursor {}",
                self.current
            ),
            _ => write!(
                f,
                "ordering error: no page timestamps to advance cursor {}",
                self.current
            ),
        }
    }
}

impl std::error::Error for OrderViolation {}

/// Derives the next `lastup` lower bound from an iteration's page maxima
#[derive(Debug, Clone, Copy)]
pub struct CursorTracker {
    correction: TimeDelta,
}

impl CursorTracker {
    pub const fn new(correction: TimeDelta) -> Self {
        Self { correction }
    }

    /// `max(page_maxima) - correction`, which must be strictly after
    /// `current`.
    pub fn advance(
        &self,
        current: DateTime<Utc>,
        page_maxima: &[DateTime<Utc>],
    ) -> Result<DateTime<Utc>, OrderViolation> {
        let candidate = page_maxima.iter().max().copied();
        let proposed = candidate.and_then(|c| c.checked_sub_signed(self.correction));
        match proposed {
            Some(next) if next > current => Ok(next),
            _ => Err(OrderViolation {
                current,
                candidate,
                proposed,
            }),
        }
    }
}
