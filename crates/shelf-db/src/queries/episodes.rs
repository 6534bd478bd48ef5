//! Episode queries: bulk upsert, provider fields, and pruning.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use shelf_core::{EpisodeId, Error, Result, SeriesId};

use crate::models::{Episode, NewEpisode};

const COLS: &str = "id, series_id, path, title, season, episode, file_size, container, \
                    sub_group, resolution, video_codec, audio_codec, bit_depth, source, \
                    provider_title, image, created_at, updated_at";

/// Rows written by one [`upsert_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: u64,
    pub updated: u64,
}

/// Insert or update a batch of episodes keyed by file path, in a single
/// transaction. Either the whole batch lands or none of it does.
///
/// On conflict the scan-side columns are refreshed; provider-sourced
/// columns and the row id are kept.
pub fn upsert_batch(conn: &Connection, batch: &[NewEpisode]) -> Result<UpsertOutcome> {
    let mut outcome = UpsertOutcome::default();
    if batch.is_empty() {
        return Ok(outcome);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    let now = Utc::now().to_rfc3339();
    {
        let mut exists = tx
            .prepare_cached("SELECT 1 FROM episodes WHERE path = ?1")
            .map_err(|e| Error::database(e.to_string()))?;
        let mut upsert = tx
            .prepare_cached(
                "INSERT INTO episodes (id, series_id, path, title, season, episode, file_size,
                     container, sub_group, resolution, video_codec, audio_codec, bit_depth,
                     source, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
                 ON CONFLICT(path) DO UPDATE SET
                     series_id = excluded.series_id,
                     title = excluded.title,
                     season = excluded.season,
                     episode = excluded.episode,
                     file_size = excluded.file_size,
                     container = excluded.container,
                     sub_group = excluded.sub_group,
                     resolution = excluded.resolution,
                     video_codec = excluded.video_codec,
                     audio_codec = excluded.audio_codec,
                     bit_depth = excluded.bit_depth,
                     source = excluded.source,
                     updated_at = excluded.updated_at",
            )
            .map_err(|e| Error::database(e.to_string()))?;

        for ep in batch {
            let existed = exists
                .exists([&ep.path])
                .map_err(|e| Error::database(e.to_string()))?;
            upsert
                .execute(rusqlite::params![
                    EpisodeId::new().to_string(),
                    ep.series_id.to_string(),
                    ep.path,
                    ep.title,
                    ep.season,
                    ep.episode,
                    ep.file_size,
                    ep.container,
                    ep.sub_group,
                    ep.resolution,
                    ep.video_codec,
                    ep.audio_codec,
                    ep.bit_depth,
                    ep.source,
                    now,
                ])
                .map_err(|e| Error::database(e.to_string()))?;
            if existed {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }
    }
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(outcome)
}

/// Get an episode by its file path.
pub fn get_episode_by_path(conn: &Connection, path: &str) -> Result<Option<Episode>> {
    let sql = format!("SELECT {COLS} FROM episodes WHERE path = ?1");
    conn.query_row(&sql, [path], Episode::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List a series' episodes ordered by season and episode number.
pub fn list_episodes_by_series(conn: &Connection, series_id: SeriesId) -> Result<Vec<Episode>> {
    let sql = format!(
        "SELECT {COLS} FROM episodes WHERE series_id = ?1 ORDER BY season, episode, path"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], Episode::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Total number of episodes in the catalog.
pub fn count_episodes(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Number of a series' episodes with no provider-supplied image.
pub fn count_missing_provider_fields(conn: &Connection, series_id: SeriesId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM episodes
         WHERE series_id = ?1 AND (image IS NULL OR image = '')",
        [series_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Write provider-sourced title/image onto the matching episode(s) of a
/// series. `None` values leave the column untouched.
pub fn apply_provider_fields(
    conn: &Connection,
    series_id: SeriesId,
    season: u32,
    episode: f64,
    title: Option<&str>,
    image: Option<&str>,
) -> Result<usize> {
    conn.execute(
        "UPDATE episodes SET
            provider_title = COALESCE(?1, provider_title),
            image = COALESCE(?2, image),
            updated_at = ?3
         WHERE series_id = ?4 AND season = ?5 AND episode = ?6",
        rusqlite::params![
            title,
            image,
            Utc::now().to_rfc3339(),
            series_id.to_string(),
            season,
            episode
        ],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Delete episodes stored under `root` whose path is not in `seen`.
/// Returns the number removed.
pub fn delete_missing_under(conn: &Connection, root: &str, seen: &HashSet<String>) -> Result<usize> {
    let prefix = format!("{}/", root.trim_end_matches('/'));
    let stale: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT path FROM episodes WHERE substr(path, 1, length(?1)) = ?1")
            .map_err(|e| Error::database(e.to_string()))?;
        let paths = stmt
            .query_map([&prefix], |row| row.get::<_, String>(0))
            .map_err(|e| Error::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(e.to_string()))?;
        paths.into_iter().filter(|p| !seen.contains(p)).collect()
    };
    if stale.is_empty() {
        return Ok(0);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    {
        let mut delete = tx
            .prepare_cached("DELETE FROM episodes WHERE path = ?1")
            .map_err(|e| Error::database(e.to_string()))?;
        for path in &stale {
            delete
                .execute([path])
                .map_err(|e| Error::database(e.to_string()))?;
        }
    }
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(stale.len())
}
