//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, capacities, default job values)
//! - Protocol event family names recorded during a page load
//! - CLI option types and the library `Config`

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{BrokerConfig, Config, LogFormat, LogLevel, Opt, ReconnectPolicy};
