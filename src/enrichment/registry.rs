//! Provider registry combining several [`MetadataProvider`] implementations.
//!
//! The registry is itself a provider: [`enrich`](MetadataProvider::enrich)
//! asks every available backend in registration order and merges their
//! answers. Earlier providers win for any field they fill; later providers
//! only fill gaps. Provider ids are unioned the same way.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::provider::{EpisodeMetadata, MetadataProvider, SeriesMetadata};

/// An ordered set of metadata providers.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a provider. Registration order is merge priority.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    /// Providers that are currently usable.
    pub fn available(&self) -> Vec<&dyn MetadataProvider> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.as_ref())
            .collect()
    }

    /// Look up a provider by its [`MetadataProvider::name`].
    pub fn get(&self, name: &str) -> Option<&dyn MetadataProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for ProviderRegistry {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn is_available(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    async fn enrich(&self, title: &str) -> Result<SeriesMetadata> {
        let available = self.available();
        if available.is_empty() {
            bail!("no metadata provider available");
        }

        let mut merged: Option<SeriesMetadata> = None;
        let mut last_error = None;
        for provider in available {
            match provider.enrich(title).await {
                Ok(found) => {
                    debug!(provider = provider.name(), title, "Provider returned metadata");
                    match merged.as_mut() {
                        Some(m) => merge_into(m, found),
                        None => merged = Some(found),
                    }
                }
                Err(e) => {
                    warn!(provider = provider.name(), title, error = %e, "Provider lookup failed");
                    last_error = Some(e);
                }
            }
        }

        match (merged, last_error) {
            (Some(m), _) => Ok(m),
            (None, Some(e)) => Err(e),
            (None, None) => bail!("no metadata found for {title:?}"),
        }
    }
}

/// Fill the gaps of `into` from `other`.
fn merge_into(into: &mut SeriesMetadata, other: SeriesMetadata) {
    into.fields.fill_from(&other.fields);
    for ep in other.episodes {
        match into
            .episodes
            .iter_mut()
            .find(|e| e.season == ep.season && e.episode == ep.episode)
        {
            Some(existing) => fill_episode(existing, ep),
            None => into.episodes.push(ep),
        }
    }
}

fn fill_episode(into: &mut EpisodeMetadata, other: EpisodeMetadata) {
    if into.title.is_none() {
        into.title = other.title;
    }
    if into.image.is_none() {
        into.image = other.image;
    }
}
