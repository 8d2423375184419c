//! Harvest state machine types

use chrono::{DateTime, Utc};

use crate::cursor::OrderViolation;

/// Result of one iteration step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// All pages were full; carry on from this cursor
    Continuing(DateTime<Utc>),
    /// A page came back short (or failed): no more data
    TailReached,
    /// The cursor would not move forward
    OrderError(OrderViolation),
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    TailReached,
    OrderError(OrderViolation),
    CapReached,
}

impl Termination {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::TailReached => 0,
            Self::CapReached => 2,
            Self::OrderError(_) => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TailReached => "tail reached",
            Self::OrderError(_) => "order error",
            Self::CapReached => "iteration cap reached",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let violation = OrderViolation {
            current: DateTime::<Utc>::default(),
            candidate: None,
            proposed: None,
        };
        let codes = [
            Termination::TailReached.exit_code(),
            Termination::CapReached.exit_code(),
            Termination::OrderError(violation).exit_code(),
        ];
        assert_eq!(codes, [0, 2, 3]);
    }

    #[test]
    fn display() {
        assert_eq!(Termination::TailReached.to_string(), "tail reached");
        assert_eq!(Termination::CapReached.to_string(), "iteration cap reached");
    }
}
