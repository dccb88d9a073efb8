//! Prune command implementation.

use std::path::Path;

use crate::cli::commands::open_storage;
use crate::config::ImportConfig;
use crate::error::Result;
use crate::prune::Pruner;

/// Execute the prune command.
///
/// # Errors
///
/// Returns an error if the database is missing or a directory cannot be
/// removed.
pub fn execute(
    db_path: Option<&Path>,
    config: ImportConfig,
    retention_days: u32,
    actor: &str,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let stats = Pruner::new(&mut storage, config).prune(retention_days, actor)?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "Pruned {} of {} listings unpublished for more than {retention_days} days",
            stats.pruned, stats.stale
        );
    }

    Ok(())
}
