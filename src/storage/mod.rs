//! Result storage.
//!
//! SQLite-backed persistence of trace entries and job summaries, with a
//! circuit breaker in front of every write.

mod circuit_breaker;
mod migrations;
mod pool;
mod store;

#[cfg(test)]
mod test_helpers;

pub use circuit_breaker::DbWriteCircuitBreaker;
pub use migrations::run_migrations;
pub use pool::init_db_pool_with_path;
pub use store::{ResultStore, SqliteResultStore};
