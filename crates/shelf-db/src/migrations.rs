//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use shelf_core::{Error, Result};

/// V1: catalog tables.
///
/// Paths are the natural keys: one directory per root path, one series per
/// series-root path, one episode per file path. Removing a directory
/// cascades to its series and their episodes; removing metadata only
/// unlinks it.
const V1_INITIAL: &str = r#"
CREATE TABLE directories (
    id          TEXT PRIMARY KEY,
    path        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE metadata (
    id           TEXT PRIMARY KEY,
    title        TEXT,
    title_native TEXT,
    title_en     TEXT,
    synopsis     TEXT,
    cover_image  TEXT,
    bangumi_id   INTEGER,
    tmdb_id      INTEGER,
    anilist_id   INTEGER,
    updated_at   TEXT NOT NULL
);

CREATE TABLE series (
    id           TEXT PRIMARY KEY,
    directory_id TEXT REFERENCES directories(id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    path         TEXT NOT NULL UNIQUE,
    file_count   INTEGER NOT NULL DEFAULT 0,
    total_size   INTEGER NOT NULL DEFAULT 0,
    metadata_id  TEXT REFERENCES metadata(id) ON DELETE SET NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE episodes (
    id             TEXT PRIMARY KEY,
    series_id      TEXT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    path           TEXT NOT NULL UNIQUE,
    title          TEXT NOT NULL,
    season         INTEGER NOT NULL DEFAULT 1,
    episode        REAL,
    file_size      INTEGER NOT NULL DEFAULT 0,
    container      TEXT NOT NULL,
    sub_group      TEXT,
    resolution     TEXT,
    video_codec    TEXT,
    audio_codec    TEXT,
    bit_depth      TEXT,
    source         TEXT,
    provider_title TEXT,
    image          TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX idx_series_directory ON series(directory_id);
CREATE INDEX idx_episodes_series ON episodes(series_id);
CREATE INDEX idx_episodes_series_number ON episodes(series_id, season, episode);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        tracing::info!(version, "Applied database migration");
    }

    Ok(())
}
