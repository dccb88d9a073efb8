//! Audit event storage and retrieval.
//!
//! Events record every listing and file index mutation. They are written
//! inside the mutating transaction, so a rolled-back merge leaves no events.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Provider events
    ProviderAdded,
    ProviderUpdated,

    // Agent events
    AgentAdded,
    AgentUpdated,

    // Listing events
    ListingCreated,
    ListingUpdated,
    ListingUnpublished,
    ListingPruned,

    // File index events
    FileIndexed,
    FileChanged,
    FileRemoved,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderAdded => "provider_added",
            Self::ProviderUpdated => "provider_updated",
            Self::AgentAdded => "agent_added",
            Self::AgentUpdated => "agent_updated",
            Self::ListingCreated => "listing_created",
            Self::ListingUpdated => "listing_updated",
            Self::ListingUnpublished => "listing_unpublished",
            Self::ListingPruned => "listing_pruned",
            Self::FileIndexed => "file_indexed",
            Self::FileChanged => "file_changed",
            Self::FileRemoved => "file_removed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "provider_added" => Self::ProviderAdded,
            "provider_updated" => Self::ProviderUpdated,
            "agent_added" => Self::AgentAdded,
            "agent_updated" => Self::AgentUpdated,
            "listing_created" => Self::ListingCreated,
            "listing_updated" => Self::ListingUpdated,
            "listing_unpublished" => Self::ListingUnpublished,
            "listing_pruned" => Self::ListingPruned,
            "file_indexed" => Self::FileIndexed,
            "file_changed" => Self::FileChanged,
            "file_removed" => Self::FileRemoved,
            _ => return None,
        })
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for an entity, newest first.
///
/// Rows with an event type this build does not know are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![entity_type, entity_id, limit], |row| {
        let event_type: String = row.get(3)?;
        let Some(event_type) = EventType::parse(&event_type) else {
            return Ok(None);
        };

        Ok(Some(Event {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type,
            actor: row.get(4)?,
            old_value: row.get(5)?,
            new_value: row.get(6)?,
            comment: row.get(7)?,
            created_at: row.get(8)?,
        }))
    })?;

    let mut events = Vec::new();
    for row in rows {
        if let Some(event) = row? {
            events.push(event);
        }
    }
    Ok(events)
}
