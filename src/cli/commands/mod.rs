//! Command implementations.

pub mod agent;
pub mod import;
pub mod init;
pub mod provider;
pub mod prune;
pub mod version;

use std::path::Path;

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

/// Open the existing database.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`] if no database exists yet.
pub fn open_storage(db_path: Option<&Path>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    SqliteStorage::open(&db_path)
}
