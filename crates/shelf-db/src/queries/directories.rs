//! Directory registration.

use chrono::Utc;
use rusqlite::Connection;
use shelf_core::{DirectoryId, Error, Result};

use crate::models::Directory;

const COLS: &str = "id, path, description, created_at";

/// Register a directory. Idempotent: an existing row for `path` is returned
/// unchanged.
pub fn add_directory(
    conn: &Connection,
    path: &str,
    description: Option<&str>,
) -> Result<Directory> {
    if let Some(existing) = find_directory_by_path(conn, path)? {
        return Ok(existing);
    }

    let id = DirectoryId::new();
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO directories (id, path, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), path, description, created_at],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Directory {
        id,
        path: path.to_string(),
        description: description.map(str::to_string),
        created_at,
    })
}

/// Get a directory by ID.
pub fn get_directory(conn: &Connection, id: DirectoryId) -> Result<Option<Directory>> {
    let sql = format!("SELECT {COLS} FROM directories WHERE id = ?1");
    match conn.query_row(&sql, [id.to_string()], Directory::from_row) {
        Ok(d) => Ok(Some(d)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Find a directory by its exact path.
pub fn find_directory_by_path(conn: &Connection, path: &str) -> Result<Option<Directory>> {
    let sql = format!("SELECT {COLS} FROM directories WHERE path = ?1");
    match conn.query_row(&sql, [path], Directory::from_row) {
        Ok(d) => Ok(Some(d)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all directories ordered by path.
pub fn list_directories(conn: &Connection) -> Result<Vec<Directory>> {
    let sql = format!("SELECT {COLS} FROM directories ORDER BY path");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Directory::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete a directory (cascades to its series and their episodes).
pub fn delete_directory(conn: &Connection, id: DirectoryId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM directories WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
