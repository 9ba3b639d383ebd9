//! Dispatcher statistics tracking.
//!
//! This module provides thread-safe counters for job outcomes and for what the
//! dispatcher did with each delivery afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::{DeliveryAction, OutcomeKind};

/// Thread-safe outcome statistics tracker.
///
/// Every outcome kind and delivery action is initialized to zero on creation,
/// so counters can be shared across job tasks through an `Arc` without locking.
pub struct OutcomeStats {
    outcomes: HashMap<OutcomeKind, AtomicUsize>,
    deliveries: HashMap<DeliveryAction, AtomicUsize>,
}

impl OutcomeStats {
    pub fn new() -> Self {
        let mut outcomes = HashMap::new();
        for kind in OutcomeKind::iter() {
            outcomes.insert(kind, AtomicUsize::new(0));
        }

        let mut deliveries = HashMap::new();
        for action in DeliveryAction::iter() {
            deliveries.insert(action, AtomicUsize::new(0));
        }

        OutcomeStats {
            outcomes,
            deliveries,
        }
    }

    /// Increment an outcome counter.
    pub fn increment_outcome(&self, kind: OutcomeKind) {
        if let Some(counter) = self.outcomes.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment outcome counter for {:?} which is not in the map",
                kind
            );
        }
    }

    /// Increment a delivery action counter.
    pub fn increment_delivery(&self, action: DeliveryAction) {
        if let Some(counter) = self.deliveries.get(&action) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment delivery counter for {:?} which is not in the map",
                action
            );
        }
    }

    pub fn get_outcome_count(&self, kind: OutcomeKind) -> usize {
        self.outcomes
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn get_delivery_count(&self, action: DeliveryAction) -> usize {
        self.deliveries
            .get(&action)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Number of jobs that reached a terminal outcome.
    pub fn total_jobs(&self) -> usize {
        OutcomeKind::iter()
            .map(|kind| self.get_outcome_count(kind))
            .sum()
    }
}

impl Default for OutcomeStats {
    fn default() -> Self {
        Self::new()
    }
}
