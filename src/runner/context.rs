//! Per-job cancellation context.
//!
//! Navigation completion, the navigation timeout, the process timeout and
//! runner errors all race to decide a job's outcome. The first one to call
//! `conclude` wins and cancels everything still running for the job; later
//! calls are ignored. Finalization is claimed separately so it runs once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::job::JobOutcome;

#[derive(Debug, Default)]
pub struct JobContext {
    outcome: OnceLock<JobOutcome>,
    cancel: CancellationToken,
    finalizing: AtomicBool,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `outcome` if no outcome was decided yet.
    ///
    /// Returns `true` when this call decided the outcome.
    pub fn conclude(&self, outcome: JobOutcome) -> bool {
        let decided = self.outcome.set(outcome).is_ok();
        if decided {
            self.cancel.cancel();
        }
        decided
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.outcome.get()
    }

    pub fn is_concluded(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Resolves once an outcome has been decided.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Claims the right to finalize. Only the first caller gets `true`.
    pub fn begin_finalization(&self) -> bool {
        !self.finalizing.swap(true, Ordering::SeqCst)
    }
}
