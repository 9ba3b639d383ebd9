//! Job dispatcher.
//!
//! Owns the broker connection. Every delivery becomes one job task; the job
//! outcome decides whether the delivery is acknowledged or rejected. A
//! semaphore bounds the number of jobs in flight, and a permit is taken
//! before the next delivery is pulled, so a saturated pool stops intake.

mod delivery;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_retry::Retry;
use tokio_util::sync::CancellationToken;

use crate::app::{print_final_statistics, shutdown_gracefully, spawn_progress_logger};
use crate::broker::{BrokerConnector, MessageSource, QueueMessage};
use crate::config::{Config, ReconnectPolicy, FINALIZATION_GRACE, LOGGING_INTERVAL};
use crate::error_handling::{get_reconnect_strategy, BrokerError, OutcomeStats};
use crate::runner::JobRunner;

use delivery::{process_message, settle};

/// Intake and acknowledgement settings.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Jobs running at once; also the channel prefetch
    pub max_concurrent_jobs: usize,
    pub reconnect: ReconnectPolicy,
    pub requeue_rejected: bool,
    pub default_job_url: String,
    /// Time a job task gets to report before it is aborted
    pub job_deadline: Duration,
}

impl From<&Config> for DispatcherSettings {
    fn from(config: &Config) -> Self {
        DispatcherSettings {
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
            reconnect: config.reconnect.clone(),
            requeue_rejected: config.requeue_rejected,
            default_job_url: config.default_job_url.clone(),
            job_deadline: config.process_timeout + FINALIZATION_GRACE,
        }
    }
}

/// Why consumption on one channel stopped.
enum PumpEnd {
    Shutdown,
    Closed(String),
}

pub struct Dispatcher {
    connector: Arc<dyn BrokerConnector>,
    runner: Arc<JobRunner>,
    settings: DispatcherSettings,
    stats: Arc<OutcomeStats>,
}

impl Dispatcher {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        runner: Arc<JobRunner>,
        settings: DispatcherSettings,
    ) -> Self {
        Dispatcher {
            connector,
            runner,
            settings,
            stats: Arc::new(OutcomeStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<OutcomeStats> {
        Arc::clone(&self.stats)
    }

    /// Consumes the job queue until `shutdown` fires or the connection is
    /// lost beyond the reconnect budget.
    ///
    /// In-flight jobs always finish and are settled before this returns.
    ///
    /// # Errors
    ///
    /// Returns a `BrokerError` when no connection could be established or the
    /// connection was lost and may not be re-established.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        let start_time = Instant::now();
        let logging_cancel = CancellationToken::new();
        let logging_task = spawn_progress_logger(
            start_time,
            Arc::clone(&self.stats),
            Duration::from_secs(LOGGING_INTERVAL as u64),
            logging_cancel.clone(),
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_jobs));
        let mut jobs = JoinSet::new();
        let result = self.consume(&shutdown, &semaphore, &mut jobs).await;

        if !jobs.is_empty() {
            info!("Waiting for {} in-flight job(s)", jobs.len());
        }
        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                error!("Job task failed: {e}");
            }
        }

        shutdown_gracefully(logging_cancel, Some(logging_task)).await;
        print_final_statistics(&self.stats, start_time.elapsed().as_secs_f64());
        result
    }

    async fn consume(
        &self,
        shutdown: &CancellationToken,
        semaphore: &Arc<Semaphore>,
        jobs: &mut JoinSet<()>,
    ) -> Result<(), BrokerError> {
        let policy = &self.settings.reconnect;
        let mut reconnects = 0u32;

        loop {
            let mut source = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                source = self.connect() => source?,
            };
            info!(
                " [*] Waiting for messages in {}. To exit press CTRL+C",
                self.connector.queue()
            );

            match self.pump(source.as_mut(), shutdown, semaphore, jobs).await {
                PumpEnd::Shutdown => {
                    source.close().await;
                    return Ok(());
                }
                PumpEnd::Closed(reason) => {
                    error!("[AMQP] closed: {reason}");
                    if policy.max_reconnects == 0 {
                        return Err(BrokerError::ConnectionClosed);
                    }
                    if !policy.allows(reconnects) {
                        return Err(BrokerError::ReconnectExhausted {
                            attempts: reconnects,
                            last_error: reason,
                        });
                    }
                    reconnects += 1;
                    warn!(
                        "[AMQP] reconnecting ({reconnects}/{})",
                        policy.max_reconnects
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(Duration::from_millis(policy.initial_delay_ms)) => {}
                    }
                }
            }
        }
    }

    /// Opens a consuming channel, retrying with exponential backoff.
    async fn connect(&self) -> Result<Box<dyn MessageSource>, BrokerError> {
        let prefetch = u16::try_from(self.settings.max_concurrent_jobs).unwrap_or(u16::MAX);
        let connector = self.connector.as_ref();
        let mut attempts = 0u32;

        let connected = Retry::spawn(get_reconnect_strategy(&self.settings.reconnect), || {
            attempts += 1;
            let attempt = attempts;
            async move {
                connector.connect(prefetch).await.map_err(|e| {
                    warn!("Broker connection attempt {attempt} failed: {e}");
                    e
                })
            }
        })
        .await;

        connected.map_err(|e| {
            if self.settings.reconnect.max_reconnects == 0 {
                e
            } else {
                BrokerError::ReconnectExhausted {
                    attempts,
                    last_error: e.to_string(),
                }
            }
        })
    }

    /// Pulls deliveries while permits are available.
    async fn pump(
        &self,
        source: &mut dyn MessageSource,
        shutdown: &CancellationToken,
        semaphore: &Arc<Semaphore>,
        jobs: &mut JoinSet<()>,
    ) -> PumpEnd {
        loop {
            while let Some(joined) = jobs.try_join_next() {
                if let Err(e) = joined {
                    error!("Job task failed: {e}");
                }
            }

            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return PumpEnd::Shutdown,
                permit = Arc::clone(semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return PumpEnd::Shutdown,
                },
            };

            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return PumpEnd::Shutdown,
                next = source.next_message() => next,
            };

            match next {
                Some(Ok(message)) => self.spawn_job(jobs, message, permit),
                Some(Err(e)) => error!("[AMQP] consume error: {e}"),
                None => return PumpEnd::Closed("delivery stream ended".to_string()),
            }
        }
    }

    fn spawn_job(
        &self,
        jobs: &mut JoinSet<()>,
        message: QueueMessage,
        permit: OwnedSemaphorePermit,
    ) {
        let runner = Arc::clone(&self.runner);
        let stats = Arc::clone(&self.stats);
        let default_url = self.settings.default_job_url.clone();
        let deadline = self.settings.job_deadline;
        let requeue_rejected = self.settings.requeue_rejected;

        jobs.spawn(async move {
            let processed = process_message(&runner, &message.body, &default_url, deadline).await;
            stats.increment_outcome(processed.outcome.kind());
            settle(&message, &processed, requeue_rejected, &stats).await;
            drop(permit);
        });
    }
}
