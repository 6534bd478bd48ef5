//! Background metadata enrichment.
//!
//! Series ids are submitted to a bounded [`EnrichmentQueue`]; a fixed set of
//! workers drains it. Each worker:
//!
//! 1. loads the series and its current metadata,
//! 2. skips it unless [`needs_enrichment`] says otherwise,
//! 3. reads local assets (`tvshow.nfo`, poster),
//! 4. waits the configured inter-request interval,
//! 5. asks the provider about the cleaned series title,
//! 6. saves the merged result and publishes `metadata.updated`.
//!
//! Failures are logged and the series is dropped; it is reconsidered the
//! next time a scan submits it.

pub mod assets;
pub mod provider;
pub mod providers;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use shelf_core::config::EnrichmentConfig;
use shelf_core::events::{EventBus, EventPayload};
use shelf_core::{Error, Result, SeriesId};
use shelf_db::models::{Metadata, MetadataFields};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::CatalogStore;

pub use provider::{EpisodeMetadata, MetadataProvider, SeriesMetadata};
pub use registry::ProviderRegistry;

/// Decide whether a series should be sent to a provider.
///
/// A series needs enrichment when it has no metadata, when its metadata
/// carries no provider id, or when it is known to TMDB but some of its
/// episodes still lack provider titles/stills.
pub fn needs_enrichment(metadata: Option<&Metadata>, episodes_missing_fields: i64) -> bool {
    match metadata {
        None => true,
        Some(m) if !m.has_provider_ids() => true,
        Some(m) => m.fields.tmdb_id.is_some() && episodes_missing_fields > 0,
    }
}

/// Sending half of the enrichment queue. Cheap to clone.
///
/// Submitting waits while the queue is full, which slows the producer down
/// to the workers' pace.
#[derive(Clone)]
pub struct EnrichmentQueue {
    sender: mpsc::Sender<SeriesId>,
}

impl EnrichmentQueue {
    /// Submit a series, waiting for room in the queue.
    pub async fn submit(&self, series_id: SeriesId) -> Result<()> {
        debug!(series_id = %series_id, "Submitting series for enrichment");
        self.sender
            .send(series_id)
            .await
            .map_err(|_| Error::Internal("enrichment queue is closed".into()))
    }

    /// Blocking variant of [`submit`](Self::submit) for use off the async
    /// runtime (e.g. inside `spawn_blocking`).
    pub fn blocking_submit(&self, series_id: SeriesId) -> Result<()> {
        debug!(series_id = %series_id, "Submitting series for enrichment");
        self.sender
            .blocking_send(series_id)
            .map_err(|_| Error::Internal("enrichment queue is closed".into()))
    }

    /// Free slots left in the queue.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

/// Shared state of the enrichment workers.
struct Worker {
    store: Arc<dyn CatalogStore>,
    provider: Arc<dyn MetadataProvider>,
    bus: Arc<EventBus>,
    interval: Duration,
    cancel: CancellationToken,
}

/// Running enrichment workers.
pub struct EnrichmentScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl EnrichmentScheduler {
    /// Spawn `config.workers` workers draining a queue of
    /// `config.queue_capacity` series ids.
    ///
    /// Workers exit when `cancel` fires or once every [`EnrichmentQueue`]
    /// handle is dropped and the queue is drained.
    pub fn spawn(
        config: &EnrichmentConfig,
        store: Arc<dyn CatalogStore>,
        provider: Arc<dyn MetadataProvider>,
        bus: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> (EnrichmentQueue, Self) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let worker = Arc::new(Worker {
            store,
            provider,
            bus,
            interval: Duration::from_millis(config.rate_limit_ms),
            cancel,
        });

        let handles = (0..config.workers.max(1))
            .map(|n| tokio::spawn(run_worker(n, worker.clone(), receiver.clone())))
            .collect();

        (EnrichmentQueue { sender }, Self { handles })
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Enrichment worker panicked");
            }
        }
    }
}

async fn run_worker(n: usize, worker: Arc<Worker>, jobs: Arc<Mutex<mpsc::Receiver<SeriesId>>>) {
    debug!(worker = n, "Enrichment worker started");
    loop {
        let next = tokio::select! {
            _ = worker.cancel.cancelled() => None,
            job = async { jobs.lock().await.recv().await } => job,
        };
        let Some(series_id) = next else { break };
        worker.process(series_id).await;
    }
    debug!(worker = n, "Enrichment worker stopped");
}

impl Worker {
    async fn process(&self, series_id: SeriesId) {
        let series = match self.store.get_series(series_id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                debug!(series_id = %series_id, "Series vanished before enrichment");
                return;
            }
            Err(e) => {
                warn!(series_id = %series_id, error = %e, "Failed to load series for enrichment");
                return;
            }
        };

        let existing = match self.store.get_series_metadata(series_id) {
            Ok(m) => m,
            Err(e) => {
                warn!(series_id = %series_id, error = %e, "Failed to load series metadata");
                return;
            }
        };
        let needed = match &existing {
            Some(m) if m.fields.tmdb_id.is_some() => {
                match self.store.count_episodes_missing_provider_fields(series_id) {
                    Ok(missing) => needs_enrichment(existing.as_ref(), missing),
                    Err(e) => {
                        warn!(
                            series_id = %series_id,
                            error = %e,
                            "Failed to count episodes missing provider fields; enriching anyway"
                        );
                        true
                    }
                }
            }
            _ => needs_enrichment(existing.as_ref(), 0),
        };
        if !needed {
            debug!(series_id = %series_id, title = %series.title, "Series already enriched");
            return;
        }

        let local = assets::read_local_assets(std::path::Path::new(&series.path)).await;

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(self.interval) => {}
        }

        let query = shelf_parser::clean_title(&series.title);
        info!(series_id = %series_id, query = %query, "Enriching series");

        let mut found = match self.provider.enrich(&query).await {
            Ok(found) => found,
            Err(e) => {
                let e = Error::provider(self.provider.name(), format!("{e:#}"));
                warn!(
                    series_id = %series_id,
                    query = %query,
                    error = %e,
                    "Enrichment failed; continuing with next series"
                );
                // Local assets still count when no provider could help.
                if !has_new_values(&local, existing.as_ref()) {
                    return;
                }
                SeriesMetadata::default()
            }
        };

        found.fields.fill_from(&local);
        if let Some(m) = &existing {
            found.fields.fill_from(&m.fields);
        }

        match self.store.save_metadata(series_id, &found) {
            Ok(_) => {
                info!(series_id = %series_id, episodes = found.episodes.len(), "Enrichment succeeded");
                self.bus.publish(EventPayload::MetadataUpdated { series_id });
            }
            Err(e) => {
                warn!(series_id = %series_id, error = %e, "Failed to save series metadata");
            }
        }
    }
}

/// Whether `local` would add anything to the stored metadata.
fn has_new_values(local: &MetadataFields, existing: Option<&Metadata>) -> bool {
    let mut merged = existing.map(|m| m.fields.clone()).unwrap_or_default();
    let before = merged.clone();
    merged.fill_from(local);
    merged != before
}
