//! Batch persister: the single consumer of classified records.
//!
//! Resolves each record's series through a per-run cache, buffers episodes
//! and writes them in batches. Newly created series are announced on the
//! event bus; every series first seen in the run is handed to the
//! enrichment queue once its episodes have been flushed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shelf_core::events::{EventBus, EventPayload};
use shelf_core::SeriesId;
use shelf_db::models::NewEpisode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::resolver::{Resolved, SeriesResolver};
use super::worker::ScanRecord;
use crate::enrichment::EnrichmentQueue;
use crate::store::CatalogStore;

/// Counters produced by one aggregator run.
#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
    pub processed: u64,
    pub added: u64,
    pub updated: u64,
    pub series_created: u64,
    pub failed_batches: u64,
    /// Records dropped because their series could not be resolved.
    pub dropped: u64,
    /// Every file path received, persisted or not.
    pub seen: HashSet<String>,
}

pub struct Aggregator {
    resolver: SeriesResolver,
    store: Arc<dyn CatalogStore>,
    bus: Arc<EventBus>,
    enrichment: Option<EnrichmentQueue>,
    root: PathBuf,
    discovered: Arc<AtomicU64>,
    batch_size: usize,
    progress_interval: u64,
    batch: Vec<NewEpisode>,
    pending_enrichment: Vec<SeriesId>,
    stats: AggregateStats,
}

impl Aggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: SeriesResolver,
        store: Arc<dyn CatalogStore>,
        bus: Arc<EventBus>,
        enrichment: Option<EnrichmentQueue>,
        root: PathBuf,
        discovered: Arc<AtomicU64>,
        batch_size: usize,
        progress_interval: u64,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            resolver,
            store,
            bus,
            enrichment,
            root,
            discovered,
            batch_size,
            progress_interval,
            batch: Vec::with_capacity(batch_size),
            pending_enrichment: Vec::new(),
            stats: AggregateStats::default(),
        }
    }

    /// Drain `results` until every worker has hung up, then flush.
    ///
    /// Blocking; run it on a blocking thread.
    pub fn run(mut self, mut results: mpsc::Receiver<ScanRecord>) -> AggregateStats {
        while let Some(record) = results.blocking_recv() {
            self.push(record);
        }
        self.flush();
        debug!(
            root = %self.root.display(),
            series = self.resolver.len(),
            processed = self.stats.processed,
            "Aggregator drained"
        );
        self.stats
    }

    fn push(&mut self, record: ScanRecord) {
        let path = record.path.to_string_lossy().into_owned();
        self.stats.processed += 1;
        self.stats.seen.insert(path.clone());

        match self.resolver.resolve(&record.series) {
            Ok(Resolved::Cached(series_id)) => self.buffer(series_id, path, record),
            Ok(Resolved::Existing(series_id)) => {
                self.pending_enrichment.push(series_id);
                self.buffer(series_id, path, record);
            }
            Ok(Resolved::Created(series_id)) => {
                self.stats.series_created += 1;
                self.bus.publish(EventPayload::SeriesDiscovered {
                    series_id,
                    title: record.series.title.clone(),
                });
                self.pending_enrichment.push(series_id);
                self.buffer(series_id, path, record);
            }
            Err(e) => {
                warn!(
                    file = %path,
                    series = %record.series.path.display(),
                    error = %e,
                    "Failed to resolve series; dropping file"
                );
                self.stats.dropped += 1;
            }
        }

        if self.progress_interval > 0 && self.stats.processed % self.progress_interval == 0 {
            self.bus.publish(EventPayload::ScanProgress {
                directory: self.root.clone(),
                current: self.stats.processed,
                total: self.discovered.load(Ordering::Relaxed),
            });
        }
    }

    fn buffer(&mut self, series_id: SeriesId, path: String, record: ScanRecord) {
        let parsed = record.parsed;
        self.batch.push(NewEpisode {
            series_id,
            path,
            title: parsed.title,
            season: parsed.season,
            episode: parsed.episode,
            file_size: i64::try_from(record.size).unwrap_or(i64::MAX),
            container: parsed.extension,
            sub_group: parsed.group,
            resolution: parsed.resolution,
            video_codec: parsed.video_codec,
            audio_codec: parsed.audio_codec,
            bit_depth: parsed.bit_depth,
            source: parsed.source,
        });
        if self.batch.len() >= self.batch_size {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.batch.is_empty() {
            let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
            match self.store.upsert_episodes(&batch) {
                Ok(outcome) => {
                    self.stats.added += outcome.inserted;
                    self.stats.updated += outcome.updated;
                    debug!(
                        inserted = outcome.inserted,
                        updated = outcome.updated,
                        "Flushed episode batch"
                    );
                }
                Err(e) => {
                    warn!(size = batch.len(), error = %e, "Failed to persist episode batch; dropping it");
                    self.stats.failed_batches += 1;
                }
            }
        }
        self.submit_pending();
    }

    /// Hand series to the enrichment queue, waiting while it is full.
    fn submit_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending_enrichment);
        let Some(queue) = &self.enrichment else { return };
        for series_id in pending {
            if let Err(e) = queue.blocking_submit(series_id) {
                warn!(error = %e, "Enrichment queue unavailable; no further series will be queued");
                self.enrichment = None;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::events::Topic;
    use shelf_db::pool::init_memory_pool;

    use super::super::worker::build_record;
    use crate::store::testing::FaultyStore;
    use crate::store::SqliteStore;

    fn aggregator(store: Arc<dyn CatalogStore>, bus: Arc<EventBus>, batch_size: usize) -> Aggregator {
        Aggregator::new(
            SeriesResolver::new(store.clone(), None),
            store,
            bus,
            None,
            PathBuf::from("/lib"),
            Arc::new(AtomicU64::new(0)),
            batch_size,
            0,
        )
    }

    fn feed(records: Vec<ScanRecord>, agg: Aggregator) -> AggregateStats {
        let (tx, rx) = mpsc::channel(records.len().max(1));
        for r in records {
            tx.try_send(r).unwrap();
        }
        drop(tx);
        agg.run(rx)
    }

    fn record(path: &str) -> ScanRecord {
        build_record(PathBuf::from(path), 100).unwrap()
    }

    #[tokio::test]
    async fn creates_series_once_and_flushes_in_batches() {
        let store: Arc<dyn CatalogStore> = Arc::new(SqliteStore::new(init_memory_pool().unwrap()));
        let bus = Arc::new(EventBus::new());
        let discovered = Arc::new(AtomicU64::new(0));
        let counter = discovered.clone();
        bus.subscribe_fn(Topic::SeriesDiscovered, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let records = vec![
            record("/lib/Frieren/Season 1/[Group] Frieren - 01 [1080p].mkv"),
            record("/lib/Frieren/Season 1/[Group] Frieren - 02 [1080p].mkv"),
            record("/lib/Frieren/Season 1/[Group] Frieren - 03 [1080p].mkv"),
            record("/lib/ShowX/ShowX S02E05.mkv"),
        ];
        let agg = aggregator(store.clone(), bus, 2);
        let stats = tokio::task::spawn_blocking(move || feed(records, agg)).await.unwrap();

        assert_eq!(stats.processed, 4);
        assert_eq!(stats.added, 4);
        assert_eq!(stats.series_created, 2);
        assert_eq!(stats.seen.len(), 4);
        assert_eq!(store.list_series().unwrap().len(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(discovered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rerun_updates_instead_of_inserting() {
        let store: Arc<dyn CatalogStore> = Arc::new(SqliteStore::new(init_memory_pool().unwrap()));
        let bus = Arc::new(EventBus::new());

        for expected_added in [1, 0] {
            let agg = aggregator(store.clone(), bus.clone(), 100);
            let records = vec![record("/lib/ShowX/ShowX S02E05.mkv")];
            let stats = tokio::task::spawn_blocking(move || feed(records, agg)).await.unwrap();
            assert_eq!(stats.added, expected_added);
            assert_eq!(stats.series_created, expected_added);
        }
        assert_eq!(store.list_series().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_batch_is_dropped_and_later_batches_land() {
        let faulty = Arc::new(FaultyStore::new());
        faulty.failing_upserts.store(1, Ordering::SeqCst);
        let store: Arc<dyn CatalogStore> = faulty.clone();

        let records: Vec<ScanRecord> = (1..=5)
            .map(|n| record(&format!("/lib/Frieren/Frieren - {n:02}.mkv")))
            .collect();
        let agg = aggregator(store.clone(), Arc::new(EventBus::new()), 2);
        let stats = tokio::task::spawn_blocking(move || feed(records, agg)).await.unwrap();

        assert_eq!(stats.processed, 5);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.added, 3);
        assert_eq!(stats.seen.len(), 5);
        let conn = faulty.inner.pool().get().unwrap();
        assert_eq!(shelf_db::queries::episodes::count_episodes(&conn).unwrap(), 3);
    }
}
