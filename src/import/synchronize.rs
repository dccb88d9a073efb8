//! Diff and merge of normalized records into the listing store.
//!
//! One call merges the complete record set of one provider. The plan is
//! computed from the published rows, then applied inside a single
//! transaction: soft-deletes first, creates second, updates last. Any error
//! rolls the whole provider back.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::import::record::{Columns, ObjectData, Value};
use crate::import::resources::ResourceLinker;
use crate::openimmo::ImportMode;
use crate::storage::events::EventType;
use crate::storage::listings::{
    ListingSchema, agent_id, changed_columns, current_values, find_listing, insert_listing,
    published_listings, unpublish, update_listing,
};
use crate::storage::SqliteStorage;

/// Visibility group of imported listings.
const PROTECTION_USERGROUP: i64 = 2;

/// Outcome of one provider merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncStats {
    /// Total rows written.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl AddAssign for SyncStats {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// What a merge will do, before reclassification.
#[derive(Debug, Default, PartialEq)]
pub struct MergePlan<'r> {
    pub to_create: Vec<&'r ObjectData>,
    /// Row id → desired record.
    pub to_update: BTreeMap<i64, &'r ObjectData>,
    pub to_delete: Vec<i64>,
}

impl<'r> MergePlan<'r> {
    /// Compute the plan for a mode.
    ///
    /// `remote` maps object ids to records, `local` maps object ids of
    /// published rows to their row id.
    #[must_use]
    pub fn compute(
        mode: ImportMode,
        remote: &BTreeMap<&'r str, &'r ObjectData>,
        local: &BTreeMap<String, i64>,
    ) -> Self {
        let mut plan = Self::default();

        if mode == ImportMode::Delete {
            plan.to_delete = local
                .iter()
                .filter(|(key, _)| remote.contains_key(key.as_str()))
                .map(|(_, id)| *id)
                .collect();
            return plan;
        }

        for (key, record) in remote {
            match local.get(*key) {
                Some(id) => {
                    plan.to_update.insert(*id, *record);
                }
                None => plan.to_create.push(*record),
            }
        }

        if mode == ImportMode::Synchronize {
            plan.to_delete = local
                .iter()
                .filter(|(key, _)| !remote.contains_key(key.as_str()))
                .map(|(_, id)| *id)
                .collect();
        }

        plan
    }
}

/// Index records by object id; a later duplicate replaces an earlier one.
#[must_use]
pub fn index_records(records: &[ObjectData]) -> BTreeMap<&str, &ObjectData> {
    records.iter().map(|r| (r.object_id(), r)).collect()
}

/// Merges one provider's records at a time.
pub struct Synchronizer<'a> {
    storage: &'a mut SqliteStorage,
    linker: &'a ResourceLinker,
    actor: &'a str,
}

impl<'a> Synchronizer<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, linker: &'a ResourceLinker, actor: &'a str) -> Self {
        Self {
            storage,
            linker,
            actor,
        }
    }

    /// Merge `records` into the listings of `provider_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::SchemaMismatch`] if a record carries
    /// a column the store does not have, or a database error. Either way
    /// nothing of this provider's merge is kept.
    pub fn synchronize(
        &mut self,
        provider_id: i64,
        records: &[ObjectData],
        mode: ImportMode,
        sender_software: Option<&str>,
    ) -> Result<SyncStats> {
        let remote = index_records(records);
        let linker = self.linker;
        let now = chrono::Utc::now().timestamp();

        let stats = self.storage.mutate("synchronize", self.actor, |tx, ctx| {
            let local = published_listings(tx, provider_id)?;
            let mut plan = MergePlan::compute(mode, &remote, &local);
            let schema = ListingSchema::load(tx)?;
            let mut stats = SyncStats {
                deleted: unpublish(tx, &plan.to_delete, now)?,
                ..SyncStats::default()
            };
            for id in &plan.to_delete {
                ctx.record_event("listing", &id.to_string(), EventType::ListingUnpublished);
            }

            // Rows unpublished earlier are invisible to the published-only
            // plan; bring them back instead of inserting a duplicate.
            let mut creates = Vec::with_capacity(plan.to_create.len());
            for record in plan.to_create.drain(..) {
                match find_listing(tx, provider_id, record.object_id())? {
                    Some(existing) => {
                        if existing.published {
                            warn!(
                                provider_id,
                                object_id = record.object_id(),
                                listing = existing.id,
                                "Published listing outside the merge plan, updating it"
                            );
                        }
                        plan.to_update.insert(existing.id, record);
                    }
                    None => creates.push(record),
                }
            }

            for record in creates {
                let mut row = record.properties().clone();
                row.extend(linker.resource_references(tx, record)?);
                row.extend(listing_metadata(tx, provider_id, record)?);
                row.extend([
                    ("tstamp".to_string(), Value::Integer(now)),
                    ("date_create".to_string(), Value::Integer(now)),
                    ("object_key".to_string(), Value::from(record.object_id())),
                    (
                        "source".to_string(),
                        Value::from(sender_software.unwrap_or_default()),
                    ),
                    ("top_object".to_string(), Value::flag(false)),
                    ("notelist".to_string(), Value::flag(true)),
                    (
                        "protection_usergroup".to_string(),
                        Value::Integer(PROTECTION_USERGROUP),
                    ),
                ]);

                let id = insert_listing(tx, &schema, &row)?;
                ctx.record_comment(
                    "listing",
                    &id.to_string(),
                    EventType::ListingCreated,
                    record.object_id(),
                );
                debug!(listing = id, object_id = record.object_id(), "Created listing");
                stats.created += 1;
            }

            for (id, record) in &plan.to_update {
                let Some(current) = current_values(tx, *id)? else {
                    continue;
                };

                let mut desired = record.properties().clone();
                desired.extend(linker.resource_references(tx, record)?);
                desired.extend(listing_metadata(tx, provider_id, record)?);

                let changed = changed_columns(&current, &desired)?;
                if changed.is_empty() {
                    continue;
                }

                update_listing(tx, &schema, *id, &changed)?;
                let names = changed.keys().cloned().collect::<Vec<_>>().join(",");
                ctx.record_change(
                    "listing",
                    &id.to_string(),
                    EventType::ListingUpdated,
                    None,
                    Some(names),
                );
                debug!(listing = id, columns = changed.len(), "Updated listing");
                stats.updated += 1;
            }

            Ok(stats)
        })?;

        info!(
            provider_id,
            %mode,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            "Merged provider listings"
        );

        Ok(stats)
    }
}

/// Columns written on both create and update.
fn listing_metadata(
    conn: &Connection,
    provider_id: i64,
    record: &ObjectData,
) -> Result<Columns> {
    let agent = match record.agent_external_id() {
        Some(external_id) => agent_id(conn, provider_id, external_id)?,
        None => None,
    };

    Ok(Columns::from([
        ("provider_id".to_string(), Value::Integer(provider_id)),
        ("alias".to_string(), Value::from(record.alias())),
        ("agent_id".to_string(), agent.map_or(Value::Null, Value::Integer)),
        ("published".to_string(), Value::flag(true)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::error::Error;
    use crate::import::record::ResourceKind;
    use crate::storage::AgentDetails;
    use crate::storage::events::get_events;
    use rusqlite::OptionalExtension;
    use std::path::PathBuf;

    fn linker() -> ResourceLinker {
        ResourceLinker::new(ImportConfig {
            project_dir: PathBuf::from("/srv/site"),
            upload_dir: "files".to_string(),
            immo_dir: "openimmo".to_string(),
        })
    }

    fn record(object_id: &str, title: &str) -> ObjectData {
        record_with(object_id, &[("objekttitel", title), ("kaufpreis", "100.00")])
    }

    fn record_with(object_id: &str, properties: &[(&str, &str)]) -> ObjectData {
        let properties = properties
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect();
        let agent = Columns::from([("external_id".to_string(), Value::from("117"))]);
        ObjectData::new(
            "foo-123",
            object_id,
            properties,
            agent,
            vec![("Titel.jpg".to_string(), ResourceKind::TitleImage)],
        )
    }

    fn setup() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let provider = storage.upsert_provider("foo-123", "Foo", true, "test").unwrap();
        (storage, provider)
    }

    fn sync(
        storage: &mut SqliteStorage,
        provider: i64,
        records: &[ObjectData],
        mode: ImportMode,
    ) -> Result<SyncStats> {
        let linker = linker();
        Synchronizer::new(storage, &linker, "test").synchronize(provider, records, mode, Some("OOF"))
    }

    fn stats(created: usize, updated: usize, deleted: usize) -> SyncStats {
        SyncStats {
            created,
            updated,
            deleted,
        }
    }

    fn row(storage: &SqliteStorage, object_key: &str) -> Option<(i64, String, String)> {
        storage
            .conn()
            .query_row(
                "SELECT id, published, objekttitel FROM listings WHERE object_key = ?1 ORDER BY id DESC",
                [object_key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .unwrap()
    }

    fn count_rows(storage: &SqliteStorage) -> i64 {
        storage
            .conn()
            .query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_plan_synchronize() {
        let records = vec![record("A", "a"), record("B", "b")];
        let remote = index_records(&records);
        let local = BTreeMap::from([("B".to_string(), 2), ("C".to_string(), 3)]);

        let plan = MergePlan::compute(ImportMode::Synchronize, &remote, &local);
        assert_eq!(plan.to_create, vec![&records[0]]);
        assert_eq!(plan.to_update, BTreeMap::from([(2, &records[1])]));
        assert_eq!(plan.to_delete, vec![3]);
    }

    #[test]
    fn test_plan_patch_never_deletes() {
        let records = vec![record("A", "a"), record("B", "b")];
        let remote = index_records(&records);
        let local = BTreeMap::from([("B".to_string(), 2), ("C".to_string(), 3)]);

        let plan = MergePlan::compute(ImportMode::Patch, &remote, &local);
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_update.len(), 1);

        let plan = MergePlan::compute(ImportMode::Patch, &BTreeMap::new(), &local);
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_plan_delete_is_local() {
        let records = vec![record("A", "a"), record("B", "b")];
        let remote = index_records(&records);
        let local = BTreeMap::from([("B".to_string(), 2), ("C".to_string(), 3)]);

        let plan = MergePlan::compute(ImportMode::Delete, &remote, &local);
        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.to_delete, vec![2]);
    }

    #[test]
    fn test_duplicate_object_ids_last_wins() {
        let records = vec![record("A", "first"), record("A", "second")];
        let remote = index_records(&records);

        assert_eq!(remote.len(), 1);
        assert_eq!(
            remote["A"].properties()["objekttitel"],
            Value::from("second")
        );
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let (mut storage, provider) = setup();
        let records = vec![record("A", "Alpha"), record("B", "Beta")];

        let first = sync(&mut storage, provider, &records, ImportMode::Synchronize).unwrap();
        assert_eq!(first, stats(2, 0, 0));

        let second = sync(&mut storage, provider, &records, ImportMode::Synchronize).unwrap();
        assert_eq!(second, stats(0, 0, 0));
        assert_eq!(count_rows(&storage), 2);
    }

    #[test]
    fn test_created_rows_carry_metadata() {
        let (mut storage, provider) = setup();
        let details = AgentDetails {
            firstname: "Erika".to_string(),
            lastname: "Muster".to_string(),
            ..AgentDetails::default()
        };
        let agent = storage.upsert_agent(provider, "117", &details, "test").unwrap();

        sync(&mut storage, provider, &[record("A", "Schöne Immobilie")], ImportMode::Patch)
            .unwrap();

        let (alias, agent_id, source, published, notelist, group, fullsize): (
            String,
            Option<i64>,
            String,
            String,
            String,
            i64,
            String,
        ) = storage
            .conn()
            .query_row(
                "SELECT alias, agent_id, source, published, notelist, protection_usergroup, gallery_fullsize
                 FROM listings WHERE object_key = 'A'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?)),
            )
            .unwrap();

        assert_eq!(alias, "schoene-immobilie");
        assert_eq!(agent_id, Some(agent));
        assert_eq!(source, "OOF");
        assert_eq!(published, "1");
        assert_eq!(notelist, "1");
        assert_eq!(group, 2);
        assert_eq!(fullsize, "1");
    }

    #[test]
    fn test_unresolved_agent_is_null() {
        let (mut storage, provider) = setup();
        sync(&mut storage, provider, &[record("A", "a")], ImportMode::Patch).unwrap();

        let agent_id: Option<i64> = storage
            .conn()
            .query_row("SELECT agent_id FROM listings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(agent_id, None);
    }

    #[test]
    fn test_synchronize_soft_deletes_missing() {
        let (mut storage, provider) = setup();
        sync(
            &mut storage,
            provider,
            &[record("A", "a"), record("B", "b")],
            ImportMode::Synchronize,
        )
        .unwrap();

        let result = sync(&mut storage, provider, &[record("A", "a")], ImportMode::Synchronize)
            .unwrap();
        assert_eq!(result, stats(0, 0, 1));

        let (id, published, _) = row(&storage, "B").unwrap();
        assert_eq!(published, "");
        let events = get_events(storage.conn(), "listing", &id.to_string(), None).unwrap();
        assert_eq!(events[0].event_type, EventType::ListingUnpublished);
    }

    #[test]
    fn test_patch_keeps_missing_rows() {
        let (mut storage, provider) = setup();
        sync(
            &mut storage,
            provider,
            &[record("A", "a"), record("B", "b")],
            ImportMode::Synchronize,
        )
        .unwrap();

        let result = sync(&mut storage, provider, &[record("A", "changed")], ImportMode::Patch)
            .unwrap();
        assert_eq!(result, stats(0, 1, 0));
        assert_eq!(row(&storage, "B").unwrap().1, "1");
        assert_eq!(row(&storage, "A").unwrap().2, "changed");
    }

    #[test]
    fn test_delete_mode_only_touches_named_rows() {
        let (mut storage, provider) = setup();
        sync(
            &mut storage,
            provider,
            &[record("A", "a"), record("B", "b")],
            ImportMode::Synchronize,
        )
        .unwrap();

        let result = sync(
            &mut storage,
            provider,
            &[record("A", "a"), record("X", "unknown")],
            ImportMode::Delete,
        )
        .unwrap();

        assert_eq!(result, stats(0, 0, 1));
        assert_eq!(row(&storage, "A").unwrap().1, "");
        assert_eq!(row(&storage, "B").unwrap().1, "1");
        assert!(row(&storage, "X").is_none());
    }

    #[test]
    fn test_recreate_after_delete_reuses_row() {
        let (mut storage, provider) = setup();
        sync(&mut storage, provider, &[record("A", "a")], ImportMode::Synchronize).unwrap();
        let (id, _, _) = row(&storage, "A").unwrap();

        sync(&mut storage, provider, &[], ImportMode::Synchronize).unwrap();
        assert_eq!(row(&storage, "A").unwrap().1, "");

        let result = sync(&mut storage, provider, &[record("A", "a")], ImportMode::Patch).unwrap();
        assert_eq!(result, stats(0, 1, 0));
        assert_eq!(row(&storage, "A").unwrap(), (id, "1".to_string(), "a".to_string()));
        assert_eq!(count_rows(&storage), 1);
    }

    #[test]
    fn test_update_writes_only_changed_columns() {
        let (mut storage, provider) = setup();
        sync(&mut storage, provider, &[record("A", "a")], ImportMode::Synchronize).unwrap();
        let (id, _, _) = row(&storage, "A").unwrap();

        // Column names differ only in case: not a change.
        let same = record_with("A", &[("OBJEKTTITEL", "a"), ("Kaufpreis", "100.00")]);
        let result = sync(&mut storage, provider, &[same], ImportMode::Synchronize).unwrap();
        assert_eq!(result, stats(0, 0, 0));

        let changed = record_with("A", &[("objekttitel", "a"), ("kaufpreis", "120.00")]);
        let result = sync(&mut storage, provider, &[changed], ImportMode::Synchronize).unwrap();
        assert_eq!(result, stats(0, 1, 0));

        let events = get_events(storage.conn(), "listing", &id.to_string(), None).unwrap();
        assert_eq!(events[0].event_type, EventType::ListingUpdated);
        assert_eq!(events[0].new_value.as_deref(), Some("kaufpreis"));
    }

    #[test]
    fn test_schema_mismatch_rolls_back() {
        let (mut storage, provider) = setup();
        sync(
            &mut storage,
            provider,
            &[record("A", "a"), record("B", "b")],
            ImportMode::Synchronize,
        )
        .unwrap();

        // B would be soft-deleted before the bogus create fails.
        let records = vec![
            record("A", "a"),
            record_with("C", &[("objekttitel", "c"), ("no_such_column", "x")]),
        ];
        let err = sync(&mut storage, provider, &records, ImportMode::Synchronize).unwrap_err();

        assert!(matches!(err, Error::SchemaMismatch { ref column, .. } if column == "no_such_column"));
        assert_eq!(row(&storage, "B").unwrap().1, "1");
        assert!(row(&storage, "C").is_none());
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = stats(1, 2, 3);
        total += stats(1, 0, 1);
        assert_eq!(total, stats(2, 2, 4));
        assert_eq!(total.total(), 8);
    }
}
