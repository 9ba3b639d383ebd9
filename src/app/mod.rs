//! Application utilities.
//!
//! URL validation, progress logging, shutdown handling and statistics
//! printing used by the dispatcher.

pub mod logging;
pub mod shutdown;
pub mod statistics;
pub mod url;

// Re-export public API
pub use logging::{log_progress, spawn_progress_logger};
pub use shutdown::{cancel_on_ctrl_c, shutdown_gracefully};
pub use statistics::print_final_statistics;
pub use url::validate_and_normalize_url;
