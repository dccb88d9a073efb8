//! Housekeeping for unpublished listings.
//!
//! Listings stay in the store after a soft-delete so a later delivery can
//! bring them back. Once a listing has been unpublished for longer than the
//! retention window its attachment directory is removed. The row itself is
//! kept.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ImportConfig;
use crate::error::Result;
use crate::files::FileStore;
use crate::import::ResourceLinker;
use crate::storage::SqliteStorage;
use crate::storage::events::EventType;
use crate::storage::listings::unpublished_before;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 10;

const SECONDS_PER_DAY: i64 = 86_400;

/// Outcome of a prune run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    /// Unpublished listings past the retention window.
    pub stale: usize,
    /// Resource directories deleted.
    pub pruned: usize,
}

/// Deletes attachment directories of long-unpublished listings.
pub struct Pruner<'a> {
    storage: &'a mut SqliteStorage,
    files: FileStore,
    linker: ResourceLinker,
}

impl<'a> Pruner<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, config: ImportConfig) -> Self {
        Self {
            storage,
            files: FileStore::new(config.project_dir.clone()),
            linker: ResourceLinker::new(config),
        }
    }

    /// Prune listings unpublished for more than `retention_days`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried or a directory
    /// cannot be removed.
    pub fn prune(&mut self, retention_days: u32, actor: &str) -> Result<PruneStats> {
        let cutoff = chrono::Utc::now().timestamp() - i64::from(retention_days) * SECONDS_PER_DAY;
        let stale = unpublished_before(self.storage.conn(), cutoff)?;

        let mut stats = PruneStats {
            stale: stale.len(),
            ..PruneStats::default()
        };

        for listing in &stale {
            let base = self
                .linker
                .resource_base_path(&listing.provider_key, &listing.object_key);

            if !self.files.exists(&base) {
                continue;
            }

            self.files.delete_dir(&base)?;
            self.files.sync(self.storage, &base, actor)?;
            self.storage.mutate("prune", actor, |_tx, ctx| {
                ctx.record_comment(
                    "listing",
                    &listing.id.to_string(),
                    EventType::ListingPruned,
                    &base,
                );
                Ok(())
            })?;

            debug!(listing = listing.id, directory = %base, "Pruned resources");
            stats.pruned += 1;
        }

        info!(stale = stats.stale, pruned = stats.pruned, "Prune finished");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::events::get_events;
    use rusqlite::params;
    use std::fs;
    use tempfile::TempDir;

    fn insert_listing(
        storage: &SqliteStorage,
        provider: i64,
        object_key: &str,
        published: &str,
        age_days: i64,
    ) -> i64 {
        let tstamp = chrono::Utc::now().timestamp() - age_days * SECONDS_PER_DAY;
        storage
            .conn()
            .execute(
                "INSERT INTO listings (provider_id, object_key, published, tstamp) VALUES (?1, ?2, ?3, ?4)",
                params![provider, object_key, published, tstamp],
            )
            .unwrap();
        storage.conn().last_insert_rowid()
    }

    #[test]
    fn test_prunes_only_stale_unpublished() {
        let dir = TempDir::new().unwrap();
        let config = ImportConfig {
            project_dir: dir.path().to_path_buf(),
            upload_dir: "files".to_string(),
            immo_dir: "openimmo".to_string(),
        };
        let files = FileStore::new(dir.path());
        let mut storage = SqliteStorage::open_memory().unwrap();
        let provider = storage.upsert_provider("foo-123", "Foo", true, "test").unwrap();

        let stale = insert_listing(&storage, provider, "OLD", "", 11);
        insert_listing(&storage, provider, "RECENT", "", 2);
        insert_listing(&storage, provider, "LIVE", "1", 30);
        insert_listing(&storage, provider, "NODIR", "", 20);

        for object in ["OLD", "RECENT", "LIVE"] {
            let base = format!("files/openimmo/foo-123/{object}");
            files.create_dir(&base).unwrap();
            fs::write(files.absolute(&format!("{base}/Titel.jpg")), "x").unwrap();
            files.sync(&mut storage, &base, "test").unwrap();
        }

        let stats = Pruner::new(&mut storage, config.clone()).prune(10, "test").unwrap();
        assert_eq!(stats, PruneStats { stale: 2, pruned: 1 });

        assert!(!files.exists("files/openimmo/foo-123/OLD"));
        assert!(files.exists("files/openimmo/foo-123/RECENT"));
        assert!(files.exists("files/openimmo/foo-123/LIVE"));
        assert!(storage
            .file_uuid("files/openimmo/foo-123/OLD/Titel.jpg")
            .unwrap()
            .is_none());

        let events = get_events(storage.conn(), "listing", &stale.to_string(), None).unwrap();
        assert_eq!(events[0].event_type, EventType::ListingPruned);

        // Nothing left to do on a second run.
        let stats = Pruner::new(&mut storage, config).prune(10, "test").unwrap();
        assert_eq!(stats, PruneStats { stale: 2, pruned: 0 });
    }
}
