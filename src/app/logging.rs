//! Periodic progress logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error_handling::{DeliveryAction, OutcomeKind, OutcomeStats};

/// Logs how many jobs ended so far and how they ended.
///
/// # Arguments
///
/// * `start_time` - When the dispatcher started consuming
/// * `stats` - Shared outcome counters
pub fn log_progress(start_time: Instant, stats: &OutcomeStats) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let total = stats.total_jobs();
    let rate = if elapsed_secs > 0.0 {
        total as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Processed {} jobs in {:.2} seconds (~{:.2} jobs/sec): done={}, navigation timeouts={}, process timeouts={}, errors={}, acked={}, rejected={}",
        total,
        elapsed_secs,
        rate,
        stats.get_outcome_count(OutcomeKind::Done),
        stats.get_outcome_count(OutcomeKind::TimeoutNavigation),
        stats.get_outcome_count(OutcomeKind::TimeoutProcess),
        stats.get_outcome_count(OutcomeKind::Error),
        stats.get_delivery_count(DeliveryAction::Acked),
        stats.get_delivery_count(DeliveryAction::Rejected),
    );
}

/// Spawns a task logging progress every `interval` until `cancel` fires.
pub fn spawn_progress_logger(
    start_time: Instant,
    stats: Arc<OutcomeStats>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if stats.total_jobs() > 0 {
                        log_progress(start_time, &stats);
                    }
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }
    })
}
