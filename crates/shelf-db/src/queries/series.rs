//! Series queries and catalog-wide reconciliation.

use chrono::Utc;
use rusqlite::{Connection, ErrorCode};
use shelf_core::{Error, MetadataId, Result, SeriesId};

use crate::models::{NewSeries, Series};

const COLS: &str =
    "id, directory_id, title, path, file_count, total_size, metadata_id, created_at, updated_at";

/// Insert a new series. Fails with [`Error::Conflict`] if a series already
/// owns `path`.
pub fn create_series(conn: &Connection, new: &NewSeries) -> Result<Series> {
    let id = SeriesId::new();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO series (id, directory_id, title, path, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        rusqlite::params![
            id.to_string(),
            new.directory_id.map(|d| d.to_string()),
            new.title,
            new.path,
            now
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref f, _) if f.code == ErrorCode::ConstraintViolation => {
            Error::Conflict(format!("series path already exists: {}", new.path))
        }
        e => Error::database(e.to_string()),
    })?;

    Ok(Series {
        id,
        directory_id: new.directory_id,
        title: new.title.clone(),
        path: new.path.clone(),
        file_count: 0,
        total_size: 0,
        metadata_id: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a series by ID.
pub fn get_series(conn: &Connection, id: SeriesId) -> Result<Option<Series>> {
    let sql = format!("SELECT {COLS} FROM series WHERE id = ?1");
    match conn.query_row(&sql, [id.to_string()], Series::from_row) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Find a series by its canonical root path.
pub fn find_series_by_path(conn: &Connection, path: &str) -> Result<Option<Series>> {
    let sql = format!("SELECT {COLS} FROM series WHERE path = ?1");
    match conn.query_row(&sql, [path], Series::from_row) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all series ordered by title.
pub fn list_series(conn: &Connection) -> Result<Vec<Series>> {
    let sql = format!("SELECT {COLS} FROM series ORDER BY title, path");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Series::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Point a series at its metadata row.
pub fn set_metadata_id(conn: &Connection, id: SeriesId, metadata_id: MetadataId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE series SET metadata_id = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![metadata_id.to_string(), Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Recompute `file_count` and `total_size` of every series from its
/// persisted episodes.
pub fn recompute_aggregates(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE series SET
            file_count = (SELECT COUNT(*) FROM episodes e WHERE e.series_id = series.id),
            total_size = (SELECT COALESCE(SUM(e.file_size), 0) FROM episodes e
                          WHERE e.series_id = series.id),
            updated_at = ?1",
        [Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Attach series without an owning directory to the registered directory
/// whose path contains theirs (longest match wins). Returns the number of
/// series linked.
pub fn link_orphans(conn: &Connection) -> Result<usize> {
    const OWNER: &str = "SELECT d.id FROM directories d
         WHERE series.path = d.path
            OR substr(series.path, 1, length(d.path) + 1) = d.path || '/'
         ORDER BY length(d.path) DESC LIMIT 1";
    let sql = format!(
        "UPDATE series SET directory_id = ({OWNER})
         WHERE directory_id IS NULL AND EXISTS ({OWNER})"
    );
    conn.execute(&sql, [])
        .map_err(|e| Error::database(e.to_string()))
}

/// Delete series that own no episodes. Returns the number removed.
pub fn delete_empty_series(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM series
         WHERE NOT EXISTS (SELECT 1 FROM episodes e WHERE e.series_id = series.id)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}
