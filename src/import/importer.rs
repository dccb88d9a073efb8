//! Archive import.
//!
//! Drives one archive through normalization, resource extraction and the
//! per-provider merge. Providers not opted into the import are skipped
//! silently. A listing that cannot be normalized is logged and dropped; an
//! error anywhere else aborts the whole archive.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::error::Result;
use crate::files::FileStore;
use crate::import::normalize::{listing_title, normalize};
use crate::import::record::ObjectData;
use crate::import::resources::ResourceLinker;
use crate::import::synchronize::{SyncStats, Synchronizer};
use crate::openimmo::OpenImmoArchive;
use crate::openimmo::model::Anbieter;
use crate::storage::SqliteStorage;

/// Result of importing one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Provider key → merge result.
    pub providers: BTreeMap<String, SyncStats>,
    /// Listings dropped because they could not be normalized.
    pub skipped_records: usize,
}

impl ImportStats {
    /// Sum over all providers.
    #[must_use]
    pub fn totals(&self) -> SyncStats {
        let mut total = SyncStats::default();
        for stats in self.providers.values() {
            total += *stats;
        }
        total
    }
}

/// Imports OpenImmo archives into the listing store.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
    files: FileStore,
    linker: ResourceLinker,
    actor: String,
}

impl<'a> Importer<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, config: ImportConfig, actor: &str) -> Self {
        Self {
            storage,
            files: FileStore::new(config.project_dir.clone()),
            linker: ResourceLinker::new(config),
            actor: actor.to_string(),
        }
    }

    /// Open and import an archive file.
    ///
    /// The archive is closed before this returns, on success and on error.
    ///
    /// # Errors
    ///
    /// See [`Importer::import`].
    pub fn import_path(&mut self, path: &Path) -> Result<ImportStats> {
        let archive = OpenImmoArchive::open(path)?;
        self.import(&archive)
    }

    /// Import an opened archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, the transfer mode
    /// cannot be determined, a resource cannot be extracted, or a provider
    /// merge fails. Providers merged before the failure stay merged.
    pub fn import(&mut self, archive: &OpenImmoArchive) -> Result<ImportStats> {
        let data = archive.data()?;
        let mode = archive.import_mode()?;
        let sender_software = archive.sender_software()?;
        let recognized = self.storage.recognized_providers()?;

        info!(
            archive = %archive.path().display(),
            %mode,
            providers = data.anbieter.len(),
            "Importing archive"
        );

        let mut stats = ImportStats::default();

        for anbieter in &data.anbieter {
            let Some(provider_key) = anbieter
                .anbieternr
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
            else {
                debug!("Skipping provider without anbieternr");
                continue;
            };

            let Some(&provider_id) = recognized.get(provider_key) else {
                debug!(provider = provider_key, "Skipping unrecognized provider");
                continue;
            };

            let (records, skipped) = normalize_listings(provider_key, anbieter);
            stats.skipped_records += skipped;

            for record in &records {
                self.store_resources(archive, record)?;
            }

            let provider_stats = Synchronizer::new(self.storage, &self.linker, &self.actor)
                .synchronize(provider_id, &records, mode, sender_software)?;

            *stats.providers.entry(provider_key.to_string()).or_default() += provider_stats;
        }

        Ok(stats)
    }

    /// Extract a record's attachments and index its resource directory.
    fn store_resources(&mut self, archive: &OpenImmoArchive, record: &ObjectData) -> Result<()> {
        let base = self
            .linker
            .resource_base_path(record.provider_key(), record.object_id());
        self.files.create_dir(&base)?;

        let (present, missing): (Vec<&str>, Vec<&str>) =
            record.resource_files().partition(|name| archive.contains(name));
        if !missing.is_empty() {
            debug!(
                object_id = record.object_id(),
                missing = ?missing,
                "Attachments not shipped with the archive"
            );
        }

        archive.extract(&self.files.absolute(&base), &present)?;
        self.files.sync(self.storage, &base, &self.actor)?;

        Ok(())
    }
}

/// Normalize a provider's listings, dropping the ones that fail.
fn normalize_listings(provider_key: &str, anbieter: &Anbieter) -> (Vec<ObjectData>, usize) {
    let mut records = Vec::with_capacity(anbieter.immobilie.len());
    let mut skipped = 0;

    for immobilie in &anbieter.immobilie {
        match normalize(provider_key, immobilie) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    provider = provider_key,
                    title = listing_title(immobilie).unwrap_or("[unknown]"),
                    error = %e,
                    "Skipping listing"
                );
                skipped += 1;
            }
        }
    }

    (records, skipped)
}
