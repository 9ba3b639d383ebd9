//! Application initialization.
//!
//! Logger setup for the worker binary and for embedding applications, and
//! the results store the worker opens at startup.

mod logger;
mod store;

// Re-export public API
pub use logger::init_logger_with;
pub use store::init_result_store;
