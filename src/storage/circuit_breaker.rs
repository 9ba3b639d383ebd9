//! Circuit breaker for result writes.
//!
//! After `failure_threshold` consecutive failed writes the circuit opens and
//! writes are skipped until the cooldown expires. The first write after the
//! cooldown is a probe: success closes the circuit, failure reopens it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::{DB_CIRCUIT_BREAKER_COOLDOWN, DB_CIRCUIT_BREAKER_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { since: Instant },
    Probing,
}

/// Shared guard in front of every database write.
pub struct DbWriteCircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl DbWriteCircuitBreaker {
    pub fn new() -> Self {
        Self::with_threshold(DB_CIRCUIT_BREAKER_THRESHOLD, DB_CIRCUIT_BREAKER_COOLDOWN)
    }

    /// # Arguments
    ///
    /// * `failure_threshold` - Consecutive failures before the circuit opens
    /// * `cooldown` - How long the circuit stays open before a probe write
    pub fn with_threshold(failure_threshold: u32, cooldown: Duration) -> Self {
        DbWriteCircuitBreaker {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a write may be attempted now.
    pub fn allow_write(&self) -> bool {
        let mut state = self.state();
        match *state {
            BreakerState::Closed { .. } | BreakerState::Probing => true,
            BreakerState::Open { since } if since.elapsed() >= self.cooldown => {
                log::info!("Database write circuit breaker: cooldown expired, probing");
                *state = BreakerState::Probing;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state();
        if !matches!(*state, BreakerState::Closed { .. }) {
            log::info!("Database write circuit breaker: circuit closed after successful write");
        }
        *state = BreakerState::Closed {
            consecutive_failures: 0,
        };
    }

    pub fn record_failure(&self) {
        let mut state = self.state();
        match *state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.failure_threshold {
                    log::error!(
                        "Database write circuit breaker: circuit opened after {} consecutive failures (cooldown: {}s)",
                        failures,
                        self.cooldown.as_secs()
                    );
                    *state = BreakerState::Open {
                        since: Instant::now(),
                    };
                } else {
                    *state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            BreakerState::Probing => {
                log::warn!("Database write circuit breaker: probe write failed, reopening");
                *state = BreakerState::Open {
                    since: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state(), BreakerState::Open { .. })
    }
}

impl Default for DbWriteCircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
