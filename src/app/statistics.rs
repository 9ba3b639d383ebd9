//! Final statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{DeliveryAction, OutcomeKind, OutcomeStats};

/// Prints per-outcome and per-delivery counters at shutdown.
pub fn print_final_statistics(stats: &OutcomeStats, elapsed_seconds: f64) {
    info!(
        "Dispatcher stopped after {:.1}s, {} job(s) finished",
        elapsed_seconds,
        stats.total_jobs()
    );

    for kind in OutcomeKind::iter() {
        let count = stats.get_outcome_count(kind);
        if count > 0 {
            info!("   {}: {}", kind, count);
        }
    }
    for action in DeliveryAction::iter() {
        let count = stats.get_delivery_count(action);
        if count > 0 {
            info!("   {}: {}", action.as_str(), count);
        }
    }
}
