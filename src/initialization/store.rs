//! Results store setup.

use std::path::Path;

use log::info;

use crate::error_handling::InitializationError;
use crate::storage::SqliteResultStore;

/// Opens the migrated results database the worker writes to.
///
/// # Errors
///
/// Returns `InitializationError::DatabaseError` if the file cannot be created
/// or the schema cannot be brought up to date.
pub async fn init_result_store(db_path: &Path) -> Result<SqliteResultStore, InitializationError> {
    let store = SqliteResultStore::open(db_path).await?;
    info!("Storing results in {}", db_path.display());
    Ok(store)
}
