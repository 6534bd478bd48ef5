//! Trait definition and result types for metadata providers.
//!
//! A provider turns a cleaned series title into descriptive series metadata
//! plus per-episode titles and stills. Concrete backends live in
//! [`providers`](super::providers); [`ProviderRegistry`](super::ProviderRegistry)
//! combines several of them behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelf_db::models::MetadataFields;

/// Provider-supplied data for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub season: u32,
    pub episode: f64,
    pub title: Option<String>,
    /// Still image URL.
    pub image: Option<String>,
}

/// Everything a provider knows about a series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesMetadata {
    pub fields: MetadataFields,
    pub episodes: Vec<EpisodeMetadata>,
}

impl SeriesMetadata {
    /// `true` when neither series fields nor episodes carry any value.
    pub fn is_empty(&self) -> bool {
        self.fields == MetadataFields::default() && self.episodes.is_empty()
    }
}

/// Common interface for external metadata sources.
///
/// Implementations must be safe to share across enrichment workers.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, unique name (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Whether the provider is configured and usable (e.g. has an API key).
    fn is_available(&self) -> bool;

    /// Look up `title` and return the best match.
    ///
    /// An error means the lookup failed or produced no match; the caller
    /// logs it and moves on.
    async fn enrich(&self, title: &str) -> anyhow::Result<SeriesMetadata>;
}
