//! Database schema definitions.
//!
//! The `listings` table carries one column per normalized property; its
//! column set is the contract between the normalizer and the store. A
//! property column the table does not know is a schema mismatch and fails
//! the merge.

use rusqlite::{Connection, Result};

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema.
///
/// Timestamps are stored as INTEGER Unix seconds. Boolean columns hold
/// `'1'` or `''`. Flag groups and resource lists hold the canonical list
/// encoding (see `import::serialized`).
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Providers and Agents
-- ====================

-- Providers: upstream sources, keyed by their OpenImmo provider number
CREATE TABLE IF NOT EXISTS providers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    openimmo_enabled TEXT NOT NULL DEFAULT '1'
);

-- Agents: contact persons, matched by the provider's person number
CREATE TABLE IF NOT EXISTS agents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id INTEGER NOT NULL,
    external_id TEXT NOT NULL,
    salutation TEXT NOT NULL DEFAULT '',
    firstname TEXT NOT NULL DEFAULT '',
    lastname TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    FOREIGN KEY (provider_id) REFERENCES providers(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_agents_provider ON agents(provider_id, external_id);

-- ====================
-- Listings
-- ====================

CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id INTEGER NOT NULL,
    tstamp INTEGER NOT NULL DEFAULT 0,
    date_create INTEGER NOT NULL DEFAULT 0,
    alias TEXT NOT NULL DEFAULT '',
    object_key TEXT NOT NULL DEFAULT '',
    agent_id INTEGER,
    source TEXT NOT NULL DEFAULT '',
    published TEXT NOT NULL DEFAULT '',
    top_object TEXT NOT NULL DEFAULT '',
    notelist TEXT NOT NULL DEFAULT '',
    protection_usergroup INTEGER NOT NULL DEFAULT 0,

    -- Publication
    verfuegbar_ab TEXT NOT NULL DEFAULT '',
    abdatum TEXT NOT NULL DEFAULT '',
    bisdatum TEXT NOT NULL DEFAULT '',
    user TEXT NOT NULL DEFAULT '',

    -- Category
    nutzungsart TEXT,
    objektart TEXT NOT NULL DEFAULT '',
    objekttyp TEXT NOT NULL DEFAULT '',

    -- Condition
    baujahr INTEGER NOT NULL DEFAULT 0,
    zustand TEXT NOT NULL DEFAULT '',

    -- Free texts
    objekttitel TEXT NOT NULL DEFAULT '',
    dreizeiler TEXT,
    objektbeschreibung TEXT,
    lage TEXT,
    ausstatt_beschr TEXT,
    sonstige_angaben TEXT,

    -- Geo
    adresse_street TEXT NOT NULL DEFAULT '',
    adresse_city TEXT NOT NULL DEFAULT '',
    adresse_zipcode TEXT NOT NULL DEFAULT '',
    adresse_country TEXT NOT NULL DEFAULT '',
    bundesland TEXT NOT NULL DEFAULT '',
    adresse TEXT NOT NULL DEFAULT '',
    objektadresse_freigeben TEXT NOT NULL DEFAULT '',

    -- Prices
    waehrung TEXT NOT NULL DEFAULT '',
    kaufpreis TEXT NOT NULL DEFAULT '0.00',
    provisionspflichtig TEXT NOT NULL DEFAULT '',
    aussenprovision TEXT NOT NULL DEFAULT '',
    innenprovision TEXT NOT NULL DEFAULT '',
    nebenkosten TEXT NOT NULL DEFAULT '',
    betriebskostennetto TEXT NOT NULL DEFAULT '',
    heizkosten TEXT NOT NULL DEFAULT '',
    heizkosten_enthalten TEXT NOT NULL DEFAULT '',
    stp_freiplatz_preis TEXT NOT NULL DEFAULT '0.00',
    stp_carport_preis TEXT NOT NULL DEFAULT '0.00',
    stp_garage_preis TEXT NOT NULL DEFAULT '0.00',

    -- Areas
    wohnflaeche TEXT NOT NULL DEFAULT '',
    nutzflaeche TEXT NOT NULL DEFAULT '',
    gesamtflaeche TEXT NOT NULL DEFAULT '',
    gartenflaeche TEXT NOT NULL DEFAULT '',
    bueroflaeche TEXT NOT NULL DEFAULT '',
    ladenflaeche TEXT NOT NULL DEFAULT '',
    lagerflaeche TEXT NOT NULL DEFAULT '',
    gastroflaeche TEXT NOT NULL DEFAULT '',
    verkaufsflaeche TEXT NOT NULL DEFAULT '',
    vermietbare_flaeche TEXT NOT NULL DEFAULT '',

    -- Rooms
    anzahl_zimmer TEXT NOT NULL DEFAULT '',
    anzahl_schlafzimmer TEXT NOT NULL DEFAULT '',
    anzahl_badezimmer TEXT NOT NULL DEFAULT '',
    anzahl_balkone TEXT NOT NULL DEFAULT '',
    anzahl_terrassen TEXT NOT NULL DEFAULT '',

    -- Parking
    anzahl_garagen TEXT NOT NULL DEFAULT '',
    stp_freiplatz TEXT NOT NULL DEFAULT '',
    stp_carport TEXT NOT NULL DEFAULT '',
    stp_garage TEXT NOT NULL DEFAULT '',

    -- Floors
    etage TEXT NOT NULL DEFAULT '',
    anzahl_etagen TEXT NOT NULL DEFAULT '',

    -- Equipment
    kamin TEXT NOT NULL DEFAULT '',
    gartennutzung TEXT NOT NULL DEFAULT '',
    wg_geeignet TEXT NOT NULL DEFAULT '',
    raeume_veraenderbar TEXT NOT NULL DEFAULT '',
    rollstuhlgerecht TEXT NOT NULL DEFAULT '',
    klimatisiert TEXT NOT NULL DEFAULT '',
    wintergarten TEXT NOT NULL DEFAULT '',
    sauna TEXT NOT NULL DEFAULT '',
    badewanne TEXT NOT NULL DEFAULT '',
    dusche TEXT NOT NULL DEFAULT '',
    objausstattung__unterkellert TEXT NOT NULL DEFAULT '',
    kueche TEXT,
    boden TEXT,
    heizungsart TEXT,
    fahrstuhl TEXT,
    ausricht_balkon_terrasse TEXT,
    stellplatzart TEXT,
    moebliert TEXT NOT NULL DEFAULT '',
    anzahl_stellplaetze TEXT NOT NULL DEFAULT '',
    ausstatt_kategorie TEXT NOT NULL DEFAULT '',

    -- Distances
    distanzen_kindergarten TEXT NOT NULL DEFAULT '',
    distanzen_grundschule TEXT NOT NULL DEFAULT '',
    distanzen_realschule TEXT NOT NULL DEFAULT '',
    distanzen_gymnasium TEXT NOT NULL DEFAULT '',
    distanzen_autobahn TEXT NOT NULL DEFAULT '',
    distanzen_bus TEXT NOT NULL DEFAULT '',
    distanzen_einkaufsmoeglichkeiten TEXT NOT NULL DEFAULT '',
    distanzen_fernbahnhof TEXT NOT NULL DEFAULT '',
    distanzen_flughafen TEXT NOT NULL DEFAULT '',
    distanzen_ubahn TEXT NOT NULL DEFAULT '',
    distanzen_zentrum TEXT NOT NULL DEFAULT '',

    -- Energy certificate
    energieausweis TEXT NOT NULL DEFAULT '',
    energieausweis_typ TEXT NOT NULL DEFAULT '',
    gueltig_bis TEXT NOT NULL DEFAULT '',
    energieverbrauchkennwert TEXT NOT NULL DEFAULT '',
    energieeffizienzklasse TEXT NOT NULL DEFAULT '',
    mitwarmwasser TEXT NOT NULL DEFAULT '',
    endenergiebedarf TEXT NOT NULL DEFAULT '',
    primaerenergietraeger TEXT NOT NULL DEFAULT '',
    stromwert TEXT NOT NULL DEFAULT '',
    waermewert TEXT NOT NULL DEFAULT '',

    -- Resource references (file uuids)
    image TEXT,
    gallery TEXT NOT NULL DEFAULT 'a:0:{}',
    ordersrc_gallery TEXT NOT NULL DEFAULT 'a:0:{}',
    gallery_fullsize TEXT NOT NULL DEFAULT '',
    expose TEXT NOT NULL DEFAULT 'a:0:{}',
    ordersrc_expose TEXT NOT NULL DEFAULT 'a:0:{}',
    documents TEXT NOT NULL DEFAULT 'a:0:{}',
    ordersrc_documents TEXT NOT NULL DEFAULT 'a:0:{}',

    FOREIGN KEY (provider_id) REFERENCES providers(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_listings_provider ON listings(provider_id, object_key);
CREATE INDEX IF NOT EXISTS idx_listings_published ON listings(published, tstamp);

-- ====================
-- File Index
-- ====================

-- Files: path-addressable index of stored resources
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    extension TEXT NOT NULL DEFAULT '',
    hash TEXT NOT NULL,
    tstamp INTEGER NOT NULL
);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
"#;

/// Apply the schema to a database connection.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the schema cannot be applied.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp()
        ],
    )?;

    Ok(())
}
