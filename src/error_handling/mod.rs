//! Error handling and dispatcher statistics.
//!
//! This module provides:
//! - Error type definitions, one enum per layer
//! - Outcome and delivery statistics
//! - The broker reconnect strategy
//!
//! Errors are split by how far they travel:
//! - **Fatal**: configuration and initialization errors stop the process
//! - **Logged**: broker, browser and persistence errors are logged where they occur
//! - **Mapped**: navigation failures become a terminal job outcome

mod retry;
mod stats;
mod types;

// Re-export public API
pub use retry::get_reconnect_strategy;
pub use stats::OutcomeStats;
pub use types::{
    BrokerError, BrowserError, DatabaseError, DeliveryAction, InitializationError,
    JobConfigError, OutcomeKind,
};
