//! Listing queries that run inside a caller's transaction.
//!
//! Every function takes a plain `&Connection`, so the synchronizer can call
//! them with the `Transaction` handed out by `SqliteStorage::mutate`.
//!
//! Column names coming from normalized records are never interpolated into
//! SQL directly: they are resolved against the live `listings` schema
//! first, which also turns schema drift into [`Error::SchemaMismatch`].

use std::collections::{BTreeMap, HashMap};

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::error::{Error, Result};
use crate::import::record::{Columns, Value};

const LISTINGS: &str = "listings";

/// Column names of the `listings` table, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct ListingSchema {
    /// lowercase name → declared name
    columns: HashMap<String, String>,
}

impl ListingSchema {
    /// Read the live column set.
    ///
    /// # Errors
    ///
    /// Returns an error if the table info cannot be queried.
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([LISTINGS], |row| row.get::<_, String>(0))?
            .map(|name| name.map(|name| (name.to_lowercase(), name)))
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;

        Ok(Self { columns })
    }

    /// Declared name of a column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the table has no such column.
    pub fn resolve(&self, column: &str) -> Result<&str> {
        self.columns
            .get(&column.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| schema_mismatch(column))
    }
}

/// A listing row found by provider and object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingListing {
    pub id: i64,
    pub published: bool,
}

/// A listing unpublished long enough to be pruned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleListing {
    pub id: i64,
    pub provider_key: String,
    pub object_key: String,
}

/// Published listings of a provider: object key → row id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn published_listings(conn: &Connection, provider_id: i64) -> Result<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT object_key, id FROM listings WHERE provider_id = ?1 AND published = '1' ORDER BY id",
    )?;

    let rows = stmt
        .query_map([provider_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;

    Ok(rows)
}

/// Most recent row of a provider with the given object key, published or not.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_listing(
    conn: &Connection,
    provider_id: i64,
    object_key: &str,
) -> Result<Option<ExistingListing>> {
    let found = conn
        .query_row(
            "SELECT id, published FROM listings
             WHERE provider_id = ?1 AND object_key = ?2
             ORDER BY id DESC LIMIT 1",
            params![provider_id, object_key],
            |row| {
                Ok(ExistingListing {
                    id: row.get(0)?,
                    published: row.get::<_, String>(1)? == "1",
                })
            },
        )
        .optional()?;

    Ok(found)
}

/// Soft-delete: clear the published flag and stamp the modification time.
///
/// # Errors
///
/// Returns an error if an update fails.
pub fn unpublish(conn: &Connection, ids: &[i64], tstamp: i64) -> Result<usize> {
    let mut stmt =
        conn.prepare_cached("UPDATE listings SET published = '', tstamp = ?1 WHERE id = ?2")?;

    let mut affected = 0;
    for id in ids {
        affected += stmt.execute(params![tstamp, id])?;
    }

    Ok(affected)
}

/// Insert a listing row.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] for an unknown column, or a database
/// error if the insert fails.
pub fn insert_listing(conn: &Connection, schema: &ListingSchema, columns: &Columns) -> Result<i64> {
    let names = columns
        .keys()
        .map(|column| schema.resolve(column).map(quote))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = (1..=names.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "INSERT INTO {LISTINGS} ({}) VALUES ({placeholders})",
        names.join(", ")
    );
    conn.execute(&sql, params_from_iter(columns.values()))?;

    Ok(conn.last_insert_rowid())
}

/// Update the given columns of one listing.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] for an unknown column, or a database
/// error if the update fails.
pub fn update_listing(
    conn: &Connection,
    schema: &ListingSchema,
    id: i64,
    columns: &Columns,
) -> Result<()> {
    if columns.is_empty() {
        return Ok(());
    }

    let assignments = columns
        .keys()
        .enumerate()
        .map(|(i, column)| Ok(format!("{} = ?{}", quote(schema.resolve(column)?), i + 1)))
        .collect::<Result<Vec<_>>>()?;

    let sql = format!(
        "UPDATE {LISTINGS} SET {} WHERE id = ?{}",
        assignments.join(", "),
        columns.len() + 1
    );
    let values = columns.values().cloned().chain([Value::Integer(id)]);
    conn.execute(&sql, params_from_iter(values))?;

    Ok(())
}

/// Current values of one listing, keyed by lowercase column name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn current_values(conn: &Connection, id: i64) -> Result<Option<Columns>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM listings WHERE id = ?1")?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_lowercase)
        .collect();

    let row = stmt
        .query_row([id], |row| {
            let mut values = Columns::new();
            for (i, name) in names.iter().enumerate() {
                values.insert(name.clone(), Value::from_sql(row.get_ref(i)?));
            }
            Ok(values)
        })
        .optional()?;

    Ok(row)
}

/// Columns of `desired` whose value differs from `current`.
///
/// Names are compared case-insensitively; `current` must be keyed by
/// lowercase names as returned by [`current_values`].
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] if a desired column is not present in
/// the current row.
pub fn changed_columns(current: &Columns, desired: &Columns) -> Result<Columns> {
    let mut changed = Columns::new();

    for (column, value) in desired {
        let column = column.to_lowercase();
        let existing = current
            .get(&column)
            .ok_or_else(|| schema_mismatch(&column))?;

        if existing != value {
            changed.insert(column, value.clone());
        }
    }

    Ok(changed)
}

/// Agent row of a provider by external id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn agent_id(conn: &Connection, provider_id: i64, external_id: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM agents WHERE provider_id = ?1 AND external_id = ?2 ORDER BY id LIMIT 1",
            params![provider_id, external_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id)
}

/// File uuids for the given storage paths; unknown paths are absent.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn resource_uuids<'a>(
    conn: &Connection,
    paths: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare_cached("SELECT uuid FROM files WHERE path = ?1")?;
    let mut uuids = HashMap::new();

    for path in paths {
        if let Some(uuid) = stmt
            .query_row([path], |row| row.get::<_, String>(0))
            .optional()?
        {
            uuids.insert(path.to_string(), uuid);
        }
    }

    Ok(uuids)
}

/// Unpublished listings last modified before `cutoff` (Unix seconds).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn unpublished_before(conn: &Connection, cutoff: i64) -> Result<Vec<StaleListing>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, p.external_key, l.object_key
         FROM listings l
         JOIN providers p ON l.provider_id = p.id
         WHERE l.published = '' AND l.tstamp < ?1
         ORDER BY l.id",
    )?;

    let rows = stmt
        .query_map([cutoff], |row| {
            Ok(StaleListing {
                id: row.get(0)?,
                provider_key: row.get(1)?,
                object_key: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn quote(column: &str) -> String {
    format!("\"{column}\"")
}

fn schema_mismatch(column: &str) -> Error {
    Error::SchemaMismatch {
        table: LISTINGS.to_string(),
        column: column.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO providers (external_key, name) VALUES ('foo-123', 'Demo')",
            [],
        )
        .unwrap();
        conn
    }

    fn row(object_key: &str, published: &str) -> Columns {
        Columns::from([
            ("provider_id".to_string(), Value::Integer(1)),
            ("object_key".to_string(), Value::from(object_key)),
            ("published".to_string(), Value::from(published)),
            ("objekttitel".to_string(), Value::from("Title")),
        ])
    }

    #[test]
    fn test_insert_and_read_back() {
        let conn = setup();
        let schema = ListingSchema::load(&conn).unwrap();

        let id = insert_listing(&conn, &schema, &row("AB123", "1")).unwrap();
        let values = current_values(&conn, id).unwrap().unwrap();

        assert_eq!(values.get("objekttitel"), Some(&Value::from("Title")));
        assert_eq!(values.get("kueche"), Some(&Value::Null));
        assert_eq!(values.get("baujahr"), Some(&Value::Integer(0)));
        assert_eq!(current_values(&conn, id + 1).unwrap(), None);
    }

    #[test]
    fn test_published_listings_and_unpublish() {
        let conn = setup();
        let schema = ListingSchema::load(&conn).unwrap();
        let a = insert_listing(&conn, &schema, &row("A", "1")).unwrap();
        let b = insert_listing(&conn, &schema, &row("B", "1")).unwrap();
        insert_listing(&conn, &schema, &row("C", "")).unwrap();

        let published = published_listings(&conn, 1).unwrap();
        assert_eq!(
            published,
            BTreeMap::from([("A".to_string(), a), ("B".to_string(), b)])
        );

        assert_eq!(unpublish(&conn, &[a], 1_000).unwrap(), 1);
        assert_eq!(published_listings(&conn, 1).unwrap().len(), 1);
        assert_eq!(
            find_listing(&conn, 1, "A").unwrap(),
            Some(ExistingListing {
                id: a,
                published: false
            })
        );
        assert_eq!(find_listing(&conn, 1, "Z").unwrap(), None);
    }

    #[test]
    fn test_unknown_column_is_schema_mismatch() {
        let conn = setup();
        let schema = ListingSchema::load(&conn).unwrap();

        let mut columns = row("A", "1");
        columns.insert("no_such_column".to_string(), Value::from("x"));

        let err = insert_listing(&conn, &schema, &columns).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Column \"listings.no_such_column\" does not exist"
        );
    }

    #[test]
    fn test_schema_resolves_case_insensitively() {
        let conn = setup();
        let schema = ListingSchema::load(&conn).unwrap();
        assert_eq!(schema.resolve("OrderSRC_Gallery").unwrap(), "ordersrc_gallery");
    }

    #[test]
    fn test_changed_columns_is_minimal() {
        let current = Columns::from([
            ("objekttitel".to_string(), Value::from("Title")),
            ("baujahr".to_string(), Value::Integer(2002)),
            ("kueche".to_string(), Value::Null),
        ]);

        let same = Columns::from([
            ("OBJEKTTITEL".to_string(), Value::from("Title")),
            ("baujahr".to_string(), Value::Integer(2002)),
        ]);
        assert!(changed_columns(&current, &same).unwrap().is_empty());

        let different = Columns::from([
            ("objekttitel".to_string(), Value::from("Title")),
            ("kueche".to_string(), Value::from("a:1:{i:0;s:3:\"EBK\";}")),
        ]);
        let changed = changed_columns(&current, &different).unwrap();
        assert_eq!(changed.keys().collect::<Vec<_>>(), ["kueche"]);

        let unknown = Columns::from([("missing".to_string(), Value::Null)]);
        assert!(matches!(
            changed_columns(&current, &unknown),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_lookups() {
        let conn = setup();
        conn.execute(
            "INSERT INTO agents (provider_id, external_id, lastname) VALUES (1, '117', 'Doe')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO files (uuid, path, name, extension, hash, tstamp)
             VALUES ('u-1', 'files/openimmo/foo-123/AB123/Titel.jpg', 'Titel.jpg', 'jpg', 'h', 0)",
            [],
        )
        .unwrap();

        assert_eq!(agent_id(&conn, 1, "117").unwrap(), Some(1));
        assert_eq!(agent_id(&conn, 1, "118").unwrap(), None);

        let uuids = resource_uuids(
            &conn,
            [
                "files/openimmo/foo-123/AB123/Titel.jpg",
                "files/openimmo/foo-123/AB123/Missing.jpg",
            ],
        )
        .unwrap();
        assert_eq!(uuids.len(), 1);
        assert_eq!(uuids["files/openimmo/foo-123/AB123/Titel.jpg"], "u-1");
    }

    #[test]
    fn test_unpublished_before() {
        let conn = setup();
        let schema = ListingSchema::load(&conn).unwrap();
        let old = insert_listing(&conn, &schema, &row("OLD", "")).unwrap();
        let fresh = insert_listing(&conn, &schema, &row("FRESH", "")).unwrap();
        insert_listing(&conn, &schema, &row("LIVE", "1")).unwrap();
        unpublish(&conn, &[old], 100).unwrap();
        unpublish(&conn, &[fresh], 10_000).unwrap();

        let stale = unpublished_before(&conn, 5_000).unwrap();
        assert_eq!(
            stale,
            [StaleListing {
                id: old,
                provider_key: "foo-123".to_string(),
                object_key: "OLD".to_string(),
            }]
        );
    }
}
