//! Shared test helpers for storage tests.

use tempfile::TempDir;

use super::store::SqliteResultStore;

/// Opens a migrated results store in a fresh temporary directory.
///
/// The directory guard must outlive the store.
pub async fn open_test_store() -> (SqliteResultStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = SqliteResultStore::open(&dir.path().join("results.db"))
        .await
        .expect("Failed to open test store");
    (store, dir)
}
