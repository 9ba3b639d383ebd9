//! Terminal job outcomes.

use std::fmt;

use crate::error_handling::OutcomeKind;

/// Terminal status of a job, produced exactly once.
///
/// `Done` is the only outcome that acknowledges the message; every other
/// outcome rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    TimeoutNavigation,
    TimeoutProcess,
    Error(String),
}

impl JobOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            JobOutcome::Done => OutcomeKind::Done,
            JobOutcome::TimeoutNavigation => OutcomeKind::TimeoutNavigation,
            JobOutcome::TimeoutProcess => OutcomeKind::TimeoutProcess,
            JobOutcome::Error(_) => OutcomeKind::Error,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            JobOutcome::Error(detail) => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Error(detail) => write!(f, "Error: {detail}"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}
