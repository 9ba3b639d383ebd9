//! Reconnect strategy for the broker connection.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::{ReconnectPolicy, RECONNECT_FACTOR};

/// Creates an exponential backoff strategy for broker connection attempts.
///
/// Returns a strategy configured with:
/// - Initial delay: `policy.initial_delay_ms` milliseconds
/// - Backoff factor: `RECONNECT_FACTOR` (doubles delay each retry)
/// - Maximum delay: `policy.max_delay`
/// - Maximum retries: `policy.max_reconnects` (0 means a single attempt)
///
/// # Returns
///
/// A retry strategy iterator ready for use with `tokio_retry::Retry`.
pub fn get_reconnect_strategy(policy: &ReconnectPolicy) -> impl Iterator<Item = Duration> {
    // ExponentialBackoff yields base^n, so the base is the initial delay
    // and the factor scales the result. A zero factor would retry in a
    // tight loop, so sub-base delays round up to one base step.
    let base = RECONNECT_FACTOR.max(2);
    ExponentialBackoff::from_millis(base)
        .factor((policy.initial_delay_ms / base).max(1))
        .max_delay(policy.max_delay)
        .take(policy.max_reconnects as usize)
}
