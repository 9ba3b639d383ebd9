//! Job finalization: correlate, summarize, persist, close.

use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::browser::BrowserSession;
use crate::config::{BROWSER_CLOSE_TIMEOUT, COOKIE_JAR_TIMEOUT};
use crate::job::{JobConfig, JobOutcome, JobSummary};
use crate::trace::{correlate, CapturedRequest, CookieRecord, ProtocolEvent};

use super::{JobContext, JobRunner, JobState};

impl JobRunner {
    /// Runs the single finalization of a job and returns its outcome.
    ///
    /// Persistence and browser-close failures are logged and never change
    /// the outcome that was already decided.
    pub(super) async fn finalize(
        &self,
        job: &JobConfig,
        session: Option<Box<dyn BrowserSession>>,
        ctx: &JobContext,
        events: &mut mpsc::Receiver<ProtocolEvent>,
        mut state: JobState,
    ) -> JobOutcome {
        if !ctx.begin_finalization() {
            warn!("Job {} was already finalized", job.work_id);
            return ctx.outcome().cloned().unwrap_or(JobOutcome::TimeoutProcess);
        }
        if !ctx.is_concluded() {
            ctx.conclude(JobOutcome::Error(
                "job stopped without a decided outcome".to_string(),
            ));
        }

        // Events already queued still belong to this job.
        while let Ok(event) = events.try_recv() {
            state.absorb(event);
        }

        let cookies = match &session {
            Some(session) => read_cookie_jar(session.as_ref()).await,
            None => Vec::new(),
        };

        let (requests, domains) = state.capture.into_parts();
        let entries = correlate(state.log.as_slice(), requests);
        let summary = JobSummary::new(job, &entries, state.load_time, cookies, domains);
        debug!(
            "Job {} correlated {} requests from {} events",
            job.work_id,
            entries.len(),
            state.log.len()
        );

        self.persist(&job.work_id, &entries, &summary).await;

        if let Some(session) = session {
            close_browser(session.as_ref(), &job.work_id).await;
        }

        ctx.outcome()
            .cloned()
            .unwrap_or_else(|| JobOutcome::Error("job ended without an outcome".to_string()))
    }

    async fn persist(&self, job_id: &str, entries: &[CapturedRequest], summary: &JobSummary) {
        match self.store.insert_trace_entries(job_id, entries).await {
            Ok(written) => debug!("Stored {written} trace entries for job {job_id}"),
            Err(e) => error!(
                "Failed to store {} trace entries for job {job_id}: {e}",
                entries.len()
            ),
        }
        if let Err(e) = self.store.insert_summary(summary).await {
            error!("Failed to store summary for job {job_id}: {e}");
        }
    }
}

async fn read_cookie_jar(session: &dyn BrowserSession) -> Vec<CookieRecord> {
    match timeout(COOKIE_JAR_TIMEOUT, session.cookies()).await {
        Ok(Ok(cookies)) => cookies,
        Ok(Err(e)) => {
            warn!("Could not read the cookie jar: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!(
                "Reading the cookie jar timed out after {}s",
                COOKIE_JAR_TIMEOUT.as_secs()
            );
            Vec::new()
        }
    }
}

async fn close_browser(session: &dyn BrowserSession, job_id: &str) {
    match timeout(BROWSER_CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => debug!("Browser closed for job {job_id}"),
        Ok(Err(e)) => debug!("Ignoring browser close failure for job {job_id}: {e}"),
        Err(_) => debug!("Ignoring browser close timeout for job {job_id}"),
    }
}
