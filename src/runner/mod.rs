//! Job runner.
//!
//! Runs one job end to end: launches an isolated browser, records protocol
//! events and captured requests while the page loads, races completion
//! against the navigation and process deadlines, then finalizes exactly once.

mod context;
mod finalize;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

use crate::browser::{BrowserLauncher, BrowserOptions, BrowserSession};
use crate::config::{
    Config, BROWSER_LAUNCH_TIMEOUT, EVENT_CHANNEL_CAPACITY, EVENT_LOADING_FINISHED,
    RESPONSE_BODY_TIMEOUT,
};
use crate::job::{JobConfig, JobOutcome};
use crate::storage::ResultStore;
use crate::trace::{EventLog, ProtocolEvent, RequestCapture, NOT_MEASURED};

pub use context::JobContext;

/// Deadlines and browser settings applied to every job.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub browser: BrowserOptions,
    /// Default navigation deadline, overridable per job
    pub navigation_timeout: Option<Duration>,
    pub process_timeout: Duration,
    pub network_idle: Duration,
}

impl From<&Config> for RunnerSettings {
    fn from(config: &Config) -> Self {
        RunnerSettings {
            browser: BrowserOptions::from(config),
            navigation_timeout: config.navigation_timeout,
            process_timeout: config.process_timeout,
            network_idle: config.network_idle,
        }
    }
}

/// Everything a job accumulates while its page loads. Owned by one runner.
struct JobState {
    log: EventLog,
    capture: RequestCapture,
    load_time: f64,
}

impl JobState {
    fn new(job: &JobConfig) -> Self {
        JobState {
            log: EventLog::new(),
            capture: RequestCapture::new(job.work_id.clone(), job.company_id()),
            load_time: NOT_MEASURED,
        }
    }

    fn absorb(&mut self, event: ProtocolEvent) {
        self.capture.ingest(&event);
        self.log.append(event);
    }
}

/// Runs jobs against a browser launcher and a result store.
pub struct JobRunner {
    launcher: Arc<dyn BrowserLauncher>,
    store: Arc<dyn ResultStore>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        store: Arc<dyn ResultStore>,
        settings: RunnerSettings,
    ) -> Self {
        JobRunner {
            launcher,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Runs `job` to its terminal outcome.
    ///
    /// Never fails: launch, navigation and protocol errors all become a
    /// `JobOutcome`. Results are persisted before this returns, whatever the
    /// outcome.
    pub async fn run(&self, job: JobConfig) -> JobOutcome {
        info!("Starting job {} for {}", job.work_id, job.url);
        let ctx = Arc::new(JobContext::new());
        let watchdog = self.arm_process_timeout(&ctx);

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut state = JobState::new(&job);

        let session = tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            launched = timeout(
                BROWSER_LAUNCH_TIMEOUT,
                self.launcher.launch(&self.settings.browser, events_tx),
            ) => match launched {
                Ok(Ok(session)) => Some(session),
                Ok(Err(e)) => {
                    ctx.conclude(JobOutcome::Error(e.to_string()));
                    None
                }
                Err(_) => {
                    ctx.conclude(JobOutcome::Error(format!(
                        "browser launch timed out after {}s",
                        BROWSER_LAUNCH_TIMEOUT.as_secs()
                    )));
                    None
                }
            },
        };

        if let Some(session) = &session {
            self.drive(&job, session.as_ref(), &ctx, &mut events_rx, &mut state)
                .await;
        }

        let outcome = self
            .finalize(&job, session, &ctx, &mut events_rx, state)
            .await;
        watchdog.abort();

        info!("Job {} finished: {}", job.work_id, outcome);
        outcome
    }

    /// Concludes `TimeoutProcess` once the process deadline passes.
    fn arm_process_timeout(&self, ctx: &Arc<JobContext>) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(ctx);
        let deadline = self.settings.process_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancelled() => {}
                _ = sleep(deadline) => {
                    if ctx.conclude(JobOutcome::TimeoutProcess) {
                        warn!("Process timeout of {}s exceeded", deadline.as_secs());
                    }
                }
            }
        })
    }

    /// Pumps protocol events until an outcome is decided.
    async fn drive(
        &self,
        job: &JobConfig,
        session: &dyn BrowserSession,
        ctx: &JobContext,
        events: &mut mpsc::Receiver<ProtocolEvent>,
        state: &mut JobState,
    ) {
        let idle_period = self.settings.network_idle;
        let navigation = self.navigate(job, session);
        tokio::pin!(navigation);
        let idle = sleep(idle_period);
        tokio::pin!(idle);
        let mut navigated = false;
        let mut listening = true;

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                navigated_result = &mut navigation, if !navigated => match navigated_result {
                    Ok(load_time) => {
                        debug!("Navigation to {} finished, load time {load_time} ms", job.url);
                        navigated = true;
                        state.load_time = load_time;
                        idle.as_mut().reset(Instant::now() + idle_period);
                    }
                    Err(outcome) => {
                        ctx.conclude(outcome);
                        break;
                    }
                },
                received = events.recv(), if listening => match received {
                    Some(event) => {
                        self.record(event, session, ctx, state).await;
                        if navigated {
                            idle.as_mut().reset(Instant::now() + idle_period);
                        }
                    }
                    None => {
                        // No more events can arrive; the idle timer ends the job.
                        debug!("Browser event stream closed for {}", job.url);
                        listening = false;
                    }
                },
                _ = &mut idle, if navigated => {
                    ctx.conclude(JobOutcome::Done);
                    break;
                }
            }
        }
    }

    /// User-agent override, bounded `goto`, then the page load time.
    async fn navigate(
        &self,
        job: &JobConfig,
        session: &dyn BrowserSession,
    ) -> Result<f64, JobOutcome> {
        if let Some(user_agent) = job.user_agent() {
            session
                .set_user_agent(user_agent)
                .await
                .map_err(|e| JobOutcome::Error(e.to_string()))?;
        }

        let goto = session.navigate(&job.url);
        let navigated = match job.navigation_timeout(self.settings.navigation_timeout) {
            Some(limit) => match timeout(limit, goto).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Navigation timeout of {} ms exceeded for {}",
                        limit.as_millis(),
                        job.url
                    );
                    return Err(JobOutcome::TimeoutNavigation);
                }
            },
            None => goto.await,
        };
        navigated.map_err(|e| JobOutcome::Error(e.to_string()))?;

        match session.load_time().await {
            Ok(load_time) => Ok(load_time),
            Err(e) => {
                debug!("Load time unavailable for {}: {e}", job.url);
                Ok(NOT_MEASURED)
            }
        }
    }

    /// Adds an event to the job state, fetching the response body of a
    /// captured request once it finished loading.
    async fn record(
        &self,
        event: ProtocolEvent,
        session: &dyn BrowserSession,
        ctx: &JobContext,
        state: &mut JobState,
    ) {
        let finished_request = if event.is(EVENT_LOADING_FINISHED) {
            event.request_id().map(str::to_string)
        } else {
            None
        };
        state.absorb(event);

        let Some(request_id) = finished_request else {
            return;
        };
        if !state.capture.contains(&request_id) {
            return;
        }
        tokio::select! {
            _ = ctx.cancelled() => {}
            body = timeout(RESPONSE_BODY_TIMEOUT, session.response_body(&request_id)) => {
                match body {
                    Ok(Ok(body)) => state.capture.record_body(&request_id, body),
                    Ok(Err(e)) => debug!("No body for request {request_id}: {e}"),
                    Err(_) => debug!("Body of request {request_id} timed out"),
                }
            }
        }
    }
}
