//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row` whose columns follow the matching `*_COLS` constant in
//! the query modules.

use shelf_core::{DirectoryId, EpisodeId, MetadataId, SeriesId};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => {
            let uuid = Uuid::parse_str(&v).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok(Some(T::from(uuid)))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// A root path registered for scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub id: DirectoryId,
    pub path: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl Directory {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            path: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// One media title, keyed by its series-root path.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub id: SeriesId,
    pub directory_id: Option<DirectoryId>,
    pub title: String,
    pub path: String,
    pub file_count: i64,
    pub total_size: i64,
    pub metadata_id: Option<MetadataId>,
    pub created_at: String,
    pub updated_at: String,
}

impl Series {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            directory_id: parse_opt_id(row, 1)?,
            title: row.get(2)?,
            path: row.get(3)?,
            file_count: row.get(4)?,
            total_size: row.get(5)?,
            metadata_id: parse_opt_id(row, 6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// Input for creating a series.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeries {
    pub directory_id: Option<DirectoryId>,
    pub title: String,
    pub path: String,
}

// ---------------------------------------------------------------------------
// Episode
// ---------------------------------------------------------------------------

/// One video file.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: EpisodeId,
    pub series_id: SeriesId,
    pub path: String,
    pub title: String,
    pub season: u32,
    pub episode: Option<f64>,
    pub file_size: i64,
    pub container: String,
    pub sub_group: Option<String>,
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub bit_depth: Option<String>,
    pub source: Option<String>,
    /// Episode title supplied by a metadata provider.
    pub provider_title: Option<String>,
    /// Still image supplied by a metadata provider.
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Episode {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            series_id: parse_id(row, 1)?,
            path: row.get(2)?,
            title: row.get(3)?,
            season: row.get(4)?,
            episode: row.get(5)?,
            file_size: row.get(6)?,
            container: row.get(7)?,
            sub_group: row.get(8)?,
            resolution: row.get(9)?,
            video_codec: row.get(10)?,
            audio_codec: row.get(11)?,
            bit_depth: row.get(12)?,
            source: row.get(13)?,
            provider_title: row.get(14)?,
            image: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

/// Scan-side fields of an episode, as written by a bulk upsert.
///
/// Provider-sourced fields are deliberately absent: a rescan never clears
/// enrichment results.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub series_id: SeriesId,
    pub path: String,
    pub title: String,
    pub season: u32,
    pub episode: Option<f64>,
    pub file_size: i64,
    pub container: String,
    pub sub_group: Option<String>,
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub bit_depth: Option<String>,
    pub source: Option<String>,
}

/// Provider-sourced fields for one episode, matched by season and number.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEpisode {
    pub season: u32,
    pub episode: f64,
    pub title: Option<String>,
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Enrichment result attached to a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub id: MetadataId,
    pub fields: MetadataFields,
    pub updated_at: String,
}

impl Metadata {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            fields: MetadataFields {
                title: row.get(1)?,
                title_native: row.get(2)?,
                title_en: row.get(3)?,
                synopsis: row.get(4)?,
                cover_image: row.get(5)?,
                bangumi_id: row.get(6)?,
                tmdb_id: row.get(7)?,
                anilist_id: row.get(8)?,
            },
            updated_at: row.get(9)?,
        })
    }

    /// Returns `true` when at least one external provider id is known.
    pub fn has_provider_ids(&self) -> bool {
        self.fields.has_provider_ids()
    }
}

/// Descriptive metadata columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFields {
    pub title: Option<String>,
    pub title_native: Option<String>,
    pub title_en: Option<String>,
    pub synopsis: Option<String>,
    pub cover_image: Option<String>,
    pub bangumi_id: Option<i64>,
    pub tmdb_id: Option<i64>,
    pub anilist_id: Option<i64>,
}

impl MetadataFields {
    pub fn has_provider_ids(&self) -> bool {
        self.bangumi_id.is_some() || self.tmdb_id.is_some() || self.anilist_id.is_some()
    }

    /// Fill every empty field of `self` from `other`.
    pub fn fill_from(&mut self, other: &MetadataFields) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.title, &other.title);
        fill(&mut self.title_native, &other.title_native);
        fill(&mut self.title_en, &other.title_en);
        fill(&mut self.synopsis, &other.synopsis);
        fill(&mut self.cover_image, &other.cover_image);
        fill(&mut self.bangumi_id, &other.bangumi_id);
        fill(&mut self.tmdb_id, &other.tmdb_id);
        fill(&mut self.anilist_id, &other.anilist_id);
    }
}
