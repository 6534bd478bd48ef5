//! Series root resolution.
//!
//! A file's series root is its parent directory, unless that parent is a
//! season folder (`Season 2`, `S2`, `Specials`, `OVA`), in which case the
//! grandparent is the root and the folder dictates the season.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shelf_core::{DirectoryId, Error, Result, SeriesId};
use shelf_db::models::NewSeries;
use tracing::debug;

use crate::store::CatalogStore;

/// Where a file's series lives, derived from its path alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRoot {
    pub path: PathBuf,
    pub title: String,
    /// Season dictated by an enclosing season folder.
    pub season: Option<u32>,
}

/// Derive the series root of `file`. `None` when the path has no named
/// parent directory.
pub fn resolve_series_root(file: &Path) -> Option<SeriesRoot> {
    let parent = file.parent()?;
    let parent_name = parent.file_name()?.to_str()?;

    if let Some(season) = shelf_parser::season_from_folder(parent_name) {
        if let Some(grandparent) = parent.parent() {
            if let Some(title) = grandparent.file_name().and_then(|n| n.to_str()) {
                return Some(SeriesRoot {
                    path: grandparent.to_path_buf(),
                    title: title.to_string(),
                    season: Some(season),
                });
            }
        }
    }

    Some(SeriesRoot {
        path: parent.to_path_buf(),
        title: parent_name.to_string(),
        season: None,
    })
}

/// How a series id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// Already seen during this run.
    Cached(SeriesId),
    /// First seen this run, already in the catalog.
    Existing(SeriesId),
    /// Created by this call.
    Created(SeriesId),
}

impl Resolved {
    pub fn id(self) -> SeriesId {
        match self {
            Resolved::Cached(id) | Resolved::Existing(id) | Resolved::Created(id) => id,
        }
    }
}

/// Per-run path to series id cache in front of the store.
///
/// Owned by a single aggregator; dropped when the run ends.
pub struct SeriesResolver {
    store: Arc<dyn CatalogStore>,
    directory_id: Option<DirectoryId>,
    cache: HashMap<String, SeriesId>,
}

impl SeriesResolver {
    pub fn new(store: Arc<dyn CatalogStore>, directory_id: Option<DirectoryId>) -> Self {
        Self {
            store,
            directory_id,
            cache: HashMap::new(),
        }
    }

    /// Look up or create the series for `root`.
    pub fn resolve(&mut self, root: &SeriesRoot) -> Result<Resolved> {
        let path = root.path.to_string_lossy().into_owned();
        if let Some(&id) = self.cache.get(&path) {
            return Ok(Resolved::Cached(id));
        }

        let resolved = match self.store.find_series_by_path(&path)? {
            Some(existing) => Resolved::Existing(existing.id),
            None => {
                let new = NewSeries {
                    directory_id: self.directory_id,
                    title: root.title.clone(),
                    path: path.clone(),
                };
                match self.store.create_series(&new) {
                    Ok(created) => {
                        debug!(series_id = %created.id, path = %path, "Created series");
                        Resolved::Created(created.id)
                    }
                    // Lost a race with another writer; use theirs.
                    Err(Error::Conflict(_)) => match self.store.find_series_by_path(&path)? {
                        Some(existing) => Resolved::Existing(existing.id),
                        None => return Err(Error::Conflict(format!("series path vanished: {path}"))),
                    },
                    Err(e) => return Err(e),
                }
            }
        };

        self.cache.insert(path, resolved.id());
        Ok(resolved)
    }

    /// Number of distinct series touched so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
