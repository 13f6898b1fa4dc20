//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: operational records read by the analytics core
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        username         TEXT PRIMARY KEY,
        client_since     TEXT NOT NULL,
        is_vip           INTEGER NOT NULL DEFAULT 0,
        source           TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS orders (
        id                   TEXT PRIMARY KEY,
        client_username      TEXT NOT NULL,
        date                 TEXT NOT NULL,
        amount               REAL NOT NULL CHECK (amount >= 0),
        source               TEXT NOT NULL,
        gig                  TEXT,
        status               TEXT NOT NULL,
        rating               REAL,
        cancellation_reasons JSON
    );

    CREATE TABLE IF NOT EXISTS expenses (
        id               TEXT PRIMARY KEY,
        date             TEXT NOT NULL,
        amount           REAL NOT NULL,
        category         TEXT NOT NULL,
        is_recurring     INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS income_sources (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS source_data_points (
        source_id        TEXT NOT NULL REFERENCES income_sources(id),
        date             TEXT NOT NULL,
        messages         INTEGER NOT NULL DEFAULT 0,

        PRIMARY KEY (source_id, date)
    );

    CREATE TABLE IF NOT EXISTS gigs (
        id               TEXT PRIMARY KEY,
        source_id        TEXT NOT NULL REFERENCES income_sources(id),
        name             TEXT NOT NULL,
        date             TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS gig_analytics (
        gig_id           TEXT NOT NULL REFERENCES gigs(id),
        date             TEXT NOT NULL,
        impressions      INTEGER NOT NULL DEFAULT 0,
        clicks           INTEGER NOT NULL DEFAULT 0,

        PRIMARY KEY (gig_id, date)
    );

    CREATE TABLE IF NOT EXISTS competitors (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS competitor_monthly_orders (
        competitor_id    TEXT NOT NULL REFERENCES competitors(id),
        year             INTEGER NOT NULL,
        month            INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
        orders           INTEGER NOT NULL DEFAULT 0,

        PRIMARY KEY (competitor_id, year, month)
    );

    CREATE TABLE IF NOT EXISTS business_notes (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        date             TEXT NOT NULL,
        title            TEXT NOT NULL,
        content          TEXT NOT NULL
    );

    -- ============================================
    -- Indexes
    -- ============================================

    CREATE INDEX IF NOT EXISTS idx_orders_date ON orders(date);
    CREATE INDEX IF NOT EXISTS idx_orders_client ON orders(client_username, date);
    CREATE INDEX IF NOT EXISTS idx_orders_source ON orders(source, date);
    CREATE INDEX IF NOT EXISTS idx_orders_gig ON orders(gig, date);
    CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);
    CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category, date);
    CREATE INDEX IF NOT EXISTS idx_clients_since ON clients(client_since);
    CREATE INDEX IF NOT EXISTS idx_gigs_source ON gigs(source_id);
    CREATE INDEX IF NOT EXISTS idx_business_notes_date ON business_notes(date);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
