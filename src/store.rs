//! Persistence seam used by the scanner and the enrichment workers.
//!
//! [`CatalogStore`] names the handful of operations the pipeline needs;
//! [`SqliteStore`] implements them on top of the `shelf-db` query functions.
//! Calls are synchronous and short; the scanner drives them from a blocking
//! task.

use std::collections::HashSet;

use shelf_core::{DirectoryId, Result, SeriesId};
use shelf_db::models::{Directory, Metadata, NewEpisode, NewSeries, ProviderEpisode, Series};
use shelf_db::pool::{get_conn, DbPool};
use shelf_db::queries::episodes::UpsertOutcome;
use shelf_db::queries::{directories, episodes, metadata, series};
use tracing::debug;

use crate::enrichment::SeriesMetadata;

/// Catalog operations needed by indexing and enrichment.
pub trait CatalogStore: Send + Sync {
    fn find_series_by_path(&self, path: &str) -> Result<Option<Series>>;

    /// Fails with `Error::Conflict` when a series already owns the path.
    fn create_series(&self, new: &NewSeries) -> Result<Series>;

    fn get_series(&self, id: SeriesId) -> Result<Option<Series>>;

    fn list_series(&self) -> Result<Vec<Series>>;

    /// Insert or update a batch keyed by path, atomically.
    fn upsert_episodes(&self, batch: &[NewEpisode]) -> Result<UpsertOutcome>;

    /// Recompute every series' file count and total size.
    fn recompute_aggregates(&self) -> Result<()>;

    fn get_series_metadata(&self, id: SeriesId) -> Result<Option<Metadata>>;

    /// Store series metadata and write episode titles/stills onto owned
    /// episodes.
    fn save_metadata(&self, id: SeriesId, metadata: &SeriesMetadata) -> Result<Metadata>;

    /// Number of a series' episodes still lacking provider-sourced fields.
    fn count_episodes_missing_provider_fields(&self, id: SeriesId) -> Result<i64>;

    fn add_directory(&self, path: &str, description: Option<&str>) -> Result<Directory>;

    fn remove_directory(&self, id: DirectoryId) -> Result<bool>;

    fn list_directories(&self) -> Result<Vec<Directory>>;

    /// Attach directory-less series to their enclosing registered directory.
    fn link_orphan_series(&self) -> Result<usize>;

    fn cleanup_empty_series(&self) -> Result<usize>;

    /// Remove episodes under `root` whose path was not seen by the last walk.
    fn prune_missing_episodes(&self, root: &str, seen: &HashSet<String>) -> Result<usize>;
}

/// [`CatalogStore`] backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl CatalogStore for SqliteStore {
    fn find_series_by_path(&self, path: &str) -> Result<Option<Series>> {
        series::find_series_by_path(&*get_conn(&self.pool)?, path)
    }

    fn create_series(&self, new: &NewSeries) -> Result<Series> {
        series::create_series(&*get_conn(&self.pool)?, new)
    }

    fn get_series(&self, id: SeriesId) -> Result<Option<Series>> {
        series::get_series(&*get_conn(&self.pool)?, id)
    }

    fn list_series(&self) -> Result<Vec<Series>> {
        series::list_series(&*get_conn(&self.pool)?)
    }

    fn upsert_episodes(&self, batch: &[NewEpisode]) -> Result<UpsertOutcome> {
        episodes::upsert_batch(&*get_conn(&self.pool)?, batch)
    }

    fn recompute_aggregates(&self) -> Result<()> {
        let n = series::recompute_aggregates(&*get_conn(&self.pool)?)?;
        debug!(series = n, "Recomputed series aggregates");
        Ok(())
    }

    fn get_series_metadata(&self, id: SeriesId) -> Result<Option<Metadata>> {
        metadata::get_for_series(&*get_conn(&self.pool)?, id)
    }

    fn save_metadata(&self, id: SeriesId, found: &SeriesMetadata) -> Result<Metadata> {
        let provider_episodes: Vec<ProviderEpisode> = found
            .episodes
            .iter()
            .map(|ep| ProviderEpisode {
                season: ep.season,
                episode: ep.episode,
                title: ep.title.clone(),
                image: ep.image.clone(),
            })
            .collect();
        metadata::save_with_episodes(&*get_conn(&self.pool)?, id, &found.fields, &provider_episodes)
    }

    fn count_episodes_missing_provider_fields(&self, id: SeriesId) -> Result<i64> {
        episodes::count_missing_provider_fields(&*get_conn(&self.pool)?, id)
    }

    fn add_directory(&self, path: &str, description: Option<&str>) -> Result<Directory> {
        directories::add_directory(&*get_conn(&self.pool)?, path, description)
    }

    fn remove_directory(&self, id: DirectoryId) -> Result<bool> {
        directories::delete_directory(&*get_conn(&self.pool)?, id)
    }

    fn list_directories(&self) -> Result<Vec<Directory>> {
        directories::list_directories(&*get_conn(&self.pool)?)
    }

    fn link_orphan_series(&self) -> Result<usize> {
        series::link_orphans(&*get_conn(&self.pool)?)
    }

    fn cleanup_empty_series(&self) -> Result<usize> {
        series::delete_empty_series(&*get_conn(&self.pool)?)
    }

    fn prune_missing_episodes(&self, root: &str, seen: &HashSet<String>) -> Result<usize> {
        episodes::delete_missing_under(&*get_conn(&self.pool)?, root, seen)
    }
}
