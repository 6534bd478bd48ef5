//! Enrichment metadata persistence.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use shelf_core::{Error, MetadataId, Result, SeriesId};

use crate::models::{Metadata, MetadataFields, ProviderEpisode};
use crate::queries::{episodes, series};

const COLS: &str = "id, title, title_native, title_en, synopsis, cover_image, \
                    bangumi_id, tmdb_id, anilist_id, updated_at";

/// Get a metadata row by ID.
pub fn get_metadata(conn: &Connection, id: MetadataId) -> Result<Option<Metadata>> {
    let sql = format!("SELECT {COLS} FROM metadata WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], Metadata::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Metadata currently linked to a series, if any.
pub fn get_for_series(conn: &Connection, series_id: SeriesId) -> Result<Option<Metadata>> {
    let sql = "SELECT m.id, m.title, m.title_native, m.title_en, m.synopsis, m.cover_image,
                      m.bangumi_id, m.tmdb_id, m.anilist_id, m.updated_at
               FROM metadata m JOIN series s ON s.metadata_id = m.id WHERE s.id = ?1";
    conn.query_row(sql, [series_id.to_string()], Metadata::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Store `fields` as the series' metadata, replacing the linked row's
/// columns or creating and linking a new row.
pub fn save_for_series(
    conn: &Connection,
    series_id: SeriesId,
    fields: &MetadataFields,
) -> Result<Metadata> {
    save_with_episodes(conn, series_id, fields, &[])
}

/// Like [`save_for_series`], also writing provider episode titles/stills
/// onto the series' matching episodes. Everything lands in one transaction.
pub fn save_with_episodes(
    conn: &Connection,
    series_id: SeriesId,
    fields: &MetadataFields,
    provider_episodes: &[ProviderEpisode],
) -> Result<Metadata> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let saved = write_metadata(&tx, series_id, fields)?;
    let mut touched = 0;
    for ep in provider_episodes {
        touched += episodes::apply_provider_fields(
            &tx,
            series_id,
            ep.season,
            ep.episode,
            ep.title.as_deref(),
            ep.image.as_deref(),
        )?;
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    tracing::debug!(series_id = %series_id, episodes = touched, "Saved series metadata");
    Ok(saved)
}

fn write_metadata(conn: &Connection, series_id: SeriesId, fields: &MetadataFields) -> Result<Metadata> {
    let current = series::get_series(conn, series_id)?
        .ok_or_else(|| Error::not_found("series", series_id))?;
    let id = current.metadata_id.unwrap_or_default();
    let updated_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO metadata (id, title, title_native, title_en, synopsis, cover_image,
             bangumi_id, tmdb_id, anilist_id, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             title_native = excluded.title_native,
             title_en = excluded.title_en,
             synopsis = excluded.synopsis,
             cover_image = excluded.cover_image,
             bangumi_id = excluded.bangumi_id,
             tmdb_id = excluded.tmdb_id,
             anilist_id = excluded.anilist_id,
             updated_at = excluded.updated_at",
        rusqlite::params![
            id.to_string(),
            fields.title,
            fields.title_native,
            fields.title_en,
            fields.synopsis,
            fields.cover_image,
            fields.bangumi_id,
            fields.tmdb_id,
            fields.anilist_id,
            updated_at
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    if current.metadata_id.is_none() {
        series::set_metadata_id(conn, series_id, id)?;
    }

    Ok(Metadata {
        id,
        fields: fields.clone(),
        updated_at,
    })
}
