//! SQLite storage implementation.
//!
//! This module provides the storage backend for immosync. It follows the
//! MutationContext pattern for transaction discipline and audit logging:
//! every write goes through [`SqliteStorage::mutate`], which runs inside an
//! IMMEDIATE transaction and records its audit events before committing.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::events::{Event, EventType, insert_event};
use crate::storage::listings::agent_id;
use crate::storage::schema::apply_schema;

/// How long a write waits for another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures to record audit events, which are written
/// right before the transaction commits.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (command name, cron, etc.).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with a comment.
    pub fn record_comment(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(comment),
        );
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

/// An upstream listing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub id: i64,
    /// OpenImmo provider number (`anbieternr`).
    pub external_key: String,
    pub name: String,
    /// Whether archives for this provider are imported.
    pub enabled: bool,
    /// Number of published listings.
    pub listings: i64,
}

/// Contact details of an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentDetails {
    pub salutation: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
}

/// A provider's contact person listings are assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub id: i64,
    /// External key of the owning provider.
    pub provider: String,
    /// Person number (`personennummer`) listings refer to.
    pub external_id: String,
    #[serde(flatten)]
    pub details: AgentDetails,
    /// Number of published listings assigned to this agent.
    pub listings: i64,
}

/// One file as seen on disk during an index sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    /// `/`-separated path relative to the project directory.
    pub path: String,
    pub name: String,
    pub extension: String,
    /// Hex SHA-256 of the content.
    pub hash: String,
}

/// Outcome of a file index sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileIndexStats {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        // Dropping `tx` on error rolls back
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ===================
    // Provider Operations
    // ===================

    /// Register a provider, or update name and enabled flag of an existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_provider(
        &mut self,
        external_key: &str,
        name: &str,
        enabled: bool,
        actor: &str,
    ) -> Result<i64> {
        let external_key = external_key.trim();
        if external_key.is_empty() {
            return Err(Error::InvalidArgument(
                "provider key must not be empty".to_string(),
            ));
        }

        self.mutate("upsert_provider", actor, |tx, ctx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM providers WHERE external_key = ?1",
                    [external_key],
                    |row| row.get(0),
                )
                .optional()?;

            let flag = if enabled { "1" } else { "" };

            let id = if let Some(id) = existing {
                tx.execute(
                    "UPDATE providers SET name = ?1, openimmo_enabled = ?2 WHERE id = ?3",
                    params![name, flag, id],
                )?;
                ctx.record_event("provider", &id.to_string(), EventType::ProviderUpdated);
                id
            } else {
                tx.execute(
                    "INSERT INTO providers (external_key, name, openimmo_enabled) VALUES (?1, ?2, ?3)",
                    params![external_key, name, flag],
                )?;
                let id = tx.last_insert_rowid();
                ctx.record_comment(
                    "provider",
                    &id.to_string(),
                    EventType::ProviderAdded,
                    external_key,
                );
                id
            };

            Ok(id)
        })
    }

    /// Get a provider by its external key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotFound`] if no such provider exists.
    pub fn get_provider(&self, external_key: &str) -> Result<Provider> {
        self.list_providers()?
            .into_iter()
            .find(|p| p.external_key == external_key)
            .ok_or_else(|| Error::ProviderNotFound {
                key: external_key.to_string(),
            })
    }

    /// List all providers with their published listing count.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.external_key, p.name, p.openimmo_enabled,
                    (SELECT COUNT(*) FROM listings l WHERE l.provider_id = p.id AND l.published = '1')
             FROM providers p
             ORDER BY p.external_key",
        )?;

        let providers = stmt
            .query_map([], |row| {
                Ok(Provider {
                    id: row.get(0)?,
                    external_key: row.get(1)?,
                    name: row.get(2)?,
                    enabled: row.get::<_, String>(3)? == "1",
                    listings: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(providers)
    }

    /// Providers opted into the OpenImmo import: external key → id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recognized_providers(&self) -> Result<BTreeMap<String, i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT external_key, id FROM providers WHERE openimmo_enabled = '1'")?;

        let providers = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;

        Ok(providers)
    }

    // ================
    // Agent Operations
    // ================

    /// Register a contact person for a provider, or update the one already
    /// registered under that person number.
    ///
    /// Imported listings are assigned to the agent whose `external_id`
    /// matches the listing's `personennummer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty person number, or an
    /// error if the write fails.
    pub fn upsert_agent(
        &mut self,
        provider_id: i64,
        external_id: &str,
        details: &AgentDetails,
        actor: &str,
    ) -> Result<i64> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(Error::InvalidArgument(
                "agent person number must not be empty".to_string(),
            ));
        }

        self.mutate("upsert_agent", actor, |tx, ctx| {
            let existing = agent_id(tx, provider_id, external_id)?;

            let id = if let Some(id) = existing {
                tx.execute(
                    "UPDATE agents
                     SET salutation = ?1, firstname = ?2, lastname = ?3, email = ?4, phone = ?5
                     WHERE id = ?6",
                    params![
                        details.salutation,
                        details.firstname,
                        details.lastname,
                        details.email,
                        details.phone,
                        id
                    ],
                )?;
                ctx.record_event("agent", &id.to_string(), EventType::AgentUpdated);
                id
            } else {
                tx.execute(
                    "INSERT INTO agents (provider_id, external_id, salutation, firstname, lastname, email, phone)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        provider_id,
                        external_id,
                        details.salutation,
                        details.firstname,
                        details.lastname,
                        details.email,
                        details.phone
                    ],
                )?;
                let id = tx.last_insert_rowid();
                ctx.record_comment("agent", &id.to_string(), EventType::AgentAdded, external_id);
                id
            };

            Ok(id)
        })
    }

    /// List agents with their published listing count, optionally for one
    /// provider only.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_agents(&self, provider_key: Option<&str>) -> Result<Vec<Agent>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, p.external_key, a.external_id, a.salutation, a.firstname,
                    a.lastname, a.email, a.phone,
                    (SELECT COUNT(*) FROM listings l WHERE l.agent_id = a.id AND l.published = '1')
             FROM agents a
             JOIN providers p ON p.id = a.provider_id
             WHERE ?1 IS NULL OR p.external_key = ?1
             ORDER BY p.external_key, a.external_id",
        )?;

        let agents = stmt
            .query_map([provider_key], |row| {
                Ok(Agent {
                    id: row.get(0)?,
                    provider: row.get(1)?,
                    external_id: row.get(2)?,
                    details: AgentDetails {
                        salutation: row.get(3)?,
                        firstname: row.get(4)?,
                        lastname: row.get(5)?,
                        email: row.get(6)?,
                        phone: row.get(7)?,
                    },
                    listings: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(agents)
    }

    // =====================
    // File Index Operations
    // =====================

    /// Bring the file index for one directory in line with its contents.
    ///
    /// `files` is the complete set of regular files currently below
    /// `directory`. New paths get a fresh v4 uuid, changed content updates
    /// the hash, and indexed paths below `directory` that are not in
    /// `files` are removed. Uuids of unchanged paths are stable.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    pub fn sync_file_index(
        &mut self,
        directory: &str,
        files: &[IndexedFile],
        actor: &str,
    ) -> Result<FileIndexStats> {
        let now = chrono::Utc::now().timestamp();
        let prefix = format!("{}/", directory.trim_end_matches('/'));

        self.mutate("sync_file_index", actor, |tx, ctx| {
            let mut stats = FileIndexStats::default();

            let indexed: BTreeMap<String, String> = {
                let mut stmt = tx.prepare(
                    "SELECT path, hash FROM files WHERE substr(path, 1, length(?1)) = ?1",
                )?;
                stmt.query_map([&prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<_>>()?
            };

            for file in files {
                match indexed.get(&file.path) {
                    None => {
                        let uuid = uuid::Uuid::new_v4().to_string();
                        tx.execute(
                            "INSERT INTO files (uuid, path, name, extension, hash, tstamp)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            params![uuid, file.path, file.name, file.extension, file.hash, now],
                        )?;
                        ctx.record_comment("file", &uuid, EventType::FileIndexed, &file.path);
                        stats.added += 1;
                    }
                    Some(hash) if *hash != file.hash => {
                        tx.execute(
                            "UPDATE files SET hash = ?1, tstamp = ?2 WHERE path = ?3",
                            params![file.hash, now, file.path],
                        )?;
                        ctx.record_change(
                            "file",
                            &file.path,
                            EventType::FileChanged,
                            Some(hash.clone()),
                            Some(file.hash.clone()),
                        );
                        stats.changed += 1;
                    }
                    Some(_) => {}
                }
            }

            for path in indexed.keys() {
                if files.iter().all(|f| f.path != *path) {
                    tx.execute("DELETE FROM files WHERE path = ?1", [path])?;
                    ctx.record_event("file", path, EventType::FileRemoved);
                    stats.removed += 1;
                }
            }

            Ok(stats)
        })
    }

    /// Uuid of an indexed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn file_uuid(&self, path: &str) -> Result<Option<String>> {
        let uuid = self
            .conn
            .query_row("SELECT uuid FROM files WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::events::get_events;

    fn file(path: &str, hash: &str) -> IndexedFile {
        IndexedFile {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            extension: "jpg".to_string(),
            hash: hash.to_string(),
        }
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_file_creates_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("immosync.db");
        SqliteStorage::open(&path).unwrap();
        assert!(path.exists());

        // Reopening an existing database is fine.
        SqliteStorage::open(&path).unwrap();
    }

    #[test]
    fn test_mutate_rolls_back_on_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result: Result<()> = storage.mutate("failing", "test", |tx, ctx| {
            tx.execute(
                "INSERT INTO providers (external_key, name) VALUES ('foo', 'Foo')",
                [],
            )?;
            ctx.record_event("provider", "1", EventType::ProviderAdded);
            Err(Error::Other("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(storage.list_providers().unwrap().is_empty());
        assert!(get_events(storage.conn(), "provider", "1", None).unwrap().is_empty());
    }

    #[test]
    fn test_provider_upsert_and_recognition() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        let foo = storage.upsert_provider("foo-123", "Foo", true, "test").unwrap();
        let bar = storage.upsert_provider("bar-456", "Bar", false, "test").unwrap();

        let recognized = storage.recognized_providers().unwrap();
        assert_eq!(recognized, BTreeMap::from([("foo-123".to_string(), foo)]));

        // Upsert keeps the id and flips the flag.
        assert_eq!(storage.upsert_provider("bar-456", "Bar", true, "test").unwrap(), bar);
        assert_eq!(storage.recognized_providers().unwrap().len(), 2);

        let provider = storage.get_provider("bar-456").unwrap();
        assert!(provider.enabled);
        assert_eq!(provider.listings, 0);

        assert!(matches!(
            storage.get_provider("nope"),
            Err(Error::ProviderNotFound { .. })
        ));
        assert!(storage.upsert_provider("  ", "Empty", true, "test").is_err());

        let events = get_events(storage.conn(), "provider", &foo.to_string(), None).unwrap();
        assert_eq!(events[0].event_type, EventType::ProviderAdded);
    }

    #[test]
    fn test_agent_upsert_and_listing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let foo = storage.upsert_provider("foo-123", "Foo", true, "test").unwrap();
        let bar = storage.upsert_provider("bar-456", "Bar", true, "test").unwrap();

        let mut details = AgentDetails {
            salutation: "Frau".to_string(),
            firstname: "Erika".to_string(),
            lastname: "Muster".to_string(),
            email: "erika@example.com".to_string(),
            phone: "0241 123".to_string(),
        };
        let erika = storage.upsert_agent(foo, " 117 ", &details, "test").unwrap();
        storage.upsert_agent(bar, "117", &AgentDetails::default(), "test").unwrap();

        // Same person number updates in place.
        details.phone = "0241 456".to_string();
        assert_eq!(storage.upsert_agent(foo, "117", &details, "test").unwrap(), erika);

        let agents = storage.list_agents(Some("foo-123")).unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, erika);
        assert_eq!(agents[0].external_id, "117");
        assert_eq!(agents[0].details, details);
        assert_eq!(agents[0].listings, 0);
        assert_eq!(storage.list_agents(None).unwrap().len(), 2);

        assert!(matches!(
            storage.upsert_agent(foo, "", &details, "test"),
            Err(Error::InvalidArgument(_))
        ));

        let events = get_events(storage.conn(), "agent", &erika.to_string(), None).unwrap();
        let kinds: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert!(kinds.contains(&EventType::AgentAdded));
        assert!(kinds.contains(&EventType::AgentUpdated));
    }

    #[test]
    fn test_file_index_sync() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let dir = "files/openimmo/foo-123/AB123";

        let first = vec![
            file("files/openimmo/foo-123/AB123/a.jpg", "h1"),
            file("files/openimmo/foo-123/AB123/b.jpg", "h2"),
        ];
        let stats = storage.sync_file_index(dir, &first, "test").unwrap();
        assert_eq!(stats, FileIndexStats { added: 2, changed: 0, removed: 0 });

        let uuid_a = storage
            .file_uuid("files/openimmo/foo-123/AB123/a.jpg")
            .unwrap()
            .unwrap();

        // An unrelated directory sharing the prefix is left alone.
        storage
            .sync_file_index(
                "files/openimmo/foo-123/AB1234",
                &[file("files/openimmo/foo-123/AB1234/c.jpg", "h3")],
                "test",
            )
            .unwrap();

        let second = vec![file("files/openimmo/foo-123/AB123/a.jpg", "h1-new")];
        let stats = storage.sync_file_index(dir, &second, "test").unwrap();
        assert_eq!(stats, FileIndexStats { added: 0, changed: 1, removed: 1 });

        assert_eq!(
            storage.file_uuid("files/openimmo/foo-123/AB123/a.jpg").unwrap(),
            Some(uuid_a)
        );
        assert_eq!(
            storage.file_uuid("files/openimmo/foo-123/AB123/b.jpg").unwrap(),
            None
        );
        assert!(storage
            .file_uuid("files/openimmo/foo-123/AB1234/c.jpg")
            .unwrap()
            .is_some());
    }
}
