//! Handling of one delivery: decode, run, settle.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::time::timeout;

use crate::broker::QueueMessage;
use crate::error_handling::{DeliveryAction, OutcomeStats};
use crate::job::{JobConfig, JobOutcome};
use crate::runner::JobRunner;

/// Result of processing one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Processed {
    pub outcome: JobOutcome,
    /// Whether a rejection may put the message back on the queue
    pub requeue_allowed: bool,
}

/// Decodes a delivery and runs its job in its own task.
///
/// The task is aborted when it has not reported within `deadline`. Bodies
/// that cannot be decoded end as `Error` and are never requeued.
pub(crate) async fn process_message(
    runner: &Arc<JobRunner>,
    body: &[u8],
    default_url: &str,
    deadline: Duration,
) -> Processed {
    let job = match JobConfig::decode(body, default_url) {
        Ok(job) => job,
        Err(e) => {
            warn!("Rejecting undecodable message: {e}");
            return Processed {
                outcome: JobOutcome::Error(e.to_string()),
                requeue_allowed: false,
            };
        }
    };

    let work_id = job.work_id.clone();
    let runner = Arc::clone(runner);
    let mut handle = tokio::spawn(async move { runner.run(job).await });
    let outcome = match timeout(deadline, &mut handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!("Job {work_id} task failed: {e}");
            JobOutcome::Error(format!("job task failed: {e}"))
        }
        Err(_) => {
            handle.abort();
            error!(
                "Job {work_id} did not report within {}s, aborted",
                deadline.as_secs()
            );
            JobOutcome::TimeoutProcess
        }
    };
    Processed {
        outcome,
        requeue_allowed: true,
    }
}

/// Acknowledges `Done` jobs and rejects everything else.
pub(crate) async fn settle(
    message: &QueueMessage,
    processed: &Processed,
    requeue_rejected: bool,
    stats: &OutcomeStats,
) -> DeliveryAction {
    let settled = if processed.outcome.is_done() {
        message.acker.ack().await.map(|()| DeliveryAction::Acked)
    } else {
        let requeue = requeue_rejected && processed.requeue_allowed;
        message
            .acker
            .reject(requeue)
            .await
            .map(|()| DeliveryAction::Rejected)
    };

    let action = match settled {
        Ok(action) => {
            debug!(
                "Delivery {} {} ({})",
                message.delivery_tag,
                action.as_str(),
                processed.outcome
            );
            action
        }
        Err(e) => {
            error!("Failed to settle delivery {}: {e}", message.delivery_tag);
            DeliveryAction::AckFailed
        }
    };
    stats.increment_delivery(action);
    action
}
