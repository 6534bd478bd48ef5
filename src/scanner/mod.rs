//! Library scanner.
//!
//! One scan runs a producer/consumer pipeline per root:
//!
//! ```text
//! walker (blocking) --jobs--> N classification workers --results--> aggregator (blocking)
//! ```
//!
//! Both channels are bounded, so a fast filesystem walk waits on the
//! workers rather than buffering paths without limit. After the stream
//! drains, the root is reconciled: missing files are pruned (only after a
//! clean, uncancelled walk) and series aggregates are recomputed from the
//! persisted rows.

pub mod aggregator;
pub mod resolver;
pub mod walker;
pub mod worker;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shelf_core::config::ScanConfig;
use shelf_core::events::{EventBus, EventPayload};
use shelf_core::{DirectoryId, Error, Result};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::enrichment::EnrichmentQueue;
use crate::store::CatalogStore;

use self::aggregator::Aggregator;
use self::resolver::SeriesResolver;

/// A directory to scan, optionally tied to its registered directory row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub directory_id: Option<DirectoryId>,
}

/// Result of scanning one root.
#[derive(Debug, Clone, Default)]
pub struct RootReport {
    pub path: PathBuf,
    pub discovered: u64,
    pub added: u64,
    pub updated: u64,
    pub series_created: u64,
    /// Files dropped by workers or the aggregator.
    pub failed_files: u64,
    pub failed_batches: u64,
    pub walk_errors: u64,
    pub pruned: usize,
    pub cancelled: bool,
}

/// Result of a whole scan run.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub roots: Vec<RootReport>,
    /// Roots that could not be walked at all, with the reason.
    pub failed_roots: Vec<(PathBuf, String)>,
    pub linked_orphans: usize,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn added(&self) -> u64 {
        self.roots.iter().map(|r| r.added).sum()
    }

    pub fn updated(&self) -> u64 {
        self.roots.iter().map(|r| r.updated).sum()
    }

    pub fn series_created(&self) -> u64 {
        self.roots.iter().map(|r| r.series_created).sum()
    }
}

/// The canonical form of a root: symlinks and `..` resolved when the path
/// exists, otherwise made absolute against the working directory. Series and
/// episode paths are derived from it, so every spelling of one tree maps to
/// the same rows.
pub fn canonical_root(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Drives scan runs against a store, publishing progress on the bus.
pub struct Scanner {
    store: Arc<dyn CatalogStore>,
    bus: Arc<EventBus>,
    enrichment: Option<EnrichmentQueue>,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(store: Arc<dyn CatalogStore>, bus: Arc<EventBus>, config: ScanConfig) -> Self {
        Self {
            store,
            bus,
            enrichment: None,
            config,
        }
    }

    /// Submit discovered series to `queue` during scans.
    pub fn with_enrichment(mut self, queue: EnrichmentQueue) -> Self {
        self.enrichment = Some(queue);
        self
    }

    /// Scan every root in turn. Unreadable roots are logged and skipped;
    /// cancellation stops after the root in progress has drained.
    pub async fn scan(&self, roots: &[ScanRoot], cancel: &CancellationToken) -> ScanReport {
        let mut report = ScanReport::default();

        for root in roots {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.scan_root(root, cancel).await {
                Ok(r) => {
                    let cancelled = r.cancelled;
                    report.roots.push(r);
                    if cancelled {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(root = %root.path.display(), error = %e, "Skipping root");
                    report.failed_roots.push((root.path.clone(), e.to_string()));
                }
            }
        }

        match self.store.link_orphan_series() {
            Ok(n) => report.linked_orphans = n,
            Err(e) => tracing::warn!(error = %e, "Failed to link orphan series"),
        }

        tracing::info!(
            roots = report.roots.len(),
            failed_roots = report.failed_roots.len(),
            added = report.added(),
            updated = report.updated(),
            series_created = report.series_created(),
            cancelled = report.cancelled,
            "Scan finished"
        );
        report
    }

    /// Scan a single root through the full pipeline.
    pub async fn scan_root(&self, root: &ScanRoot, cancel: &CancellationToken) -> Result<RootReport> {
        let root_path = canonical_root(&root.path);
        tokio::fs::read_dir(&root_path).await.map_err(|e| Error::Io {
            source: std::io::Error::new(e.kind(), format!("{}: {e}", root_path.display())),
        })?;

        tracing::info!(
            root = %root_path.display(),
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            "Starting scan"
        );
        self.bus.publish(EventPayload::ScanStarted {
            directory: root_path.clone(),
        });

        let (jobs_tx, jobs_rx) = mpsc::channel(self.config.job_capacity.max(1));
        let (results_tx, results_rx) = mpsc::channel(self.config.result_capacity.max(1));
        let discovered = Arc::new(AtomicU64::new(0));

        let walker = {
            let path = root_path.clone();
            let cancel = cancel.clone();
            let discovered = discovered.clone();
            tokio::task::spawn_blocking(move || walker::walk(&path, &jobs_tx, &cancel, &discovered))
        };

        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let workers: Vec<_> = (0..self.config.workers.max(1))
            .map(|n| tokio::spawn(worker::run_worker(n, jobs_rx.clone(), results_tx.clone())))
            .collect();
        drop(results_tx);

        let aggregator = Aggregator::new(
            SeriesResolver::new(self.store.clone(), root.directory_id),
            self.store.clone(),
            self.bus.clone(),
            self.enrichment.clone(),
            root_path.clone(),
            discovered.clone(),
            self.config.batch_size,
            self.config.progress_interval,
        );
        let aggregator = tokio::task::spawn_blocking(move || aggregator.run(results_rx));

        let walk = match walker.await {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                tracing::warn!(root = %root_path.display(), error = %e, "Walk failed");
                None
            }
            Err(e) => {
                tracing::warn!(root = %root_path.display(), error = %e, "Walker task panicked");
                None
            }
        };

        let mut failed_files = 0;
        for handle in workers {
            match handle.await {
                Ok(dropped) => failed_files += dropped,
                Err(e) => tracing::warn!(error = %e, "Classification worker panicked"),
            }
        }

        let stats = aggregator
            .await
            .map_err(|e| Error::Internal(format!("aggregator task failed: {e}")))?;

        // Reconciling.
        let cancelled = cancel.is_cancelled();
        let clean_walk = walk.is_some_and(|w| w.complete && w.errors == 0);
        let mut pruned = 0;
        if clean_walk && !cancelled {
            let root_str = root_path.to_string_lossy();
            match self.store.prune_missing_episodes(&root_str, &stats.seen) {
                Ok(n) => {
                    pruned = n;
                    if n > 0 {
                        tracing::info!(root = %root_str, pruned = n, "Pruned missing episodes");
                    }
                }
                Err(e) => tracing::warn!(root = %root_str, error = %e, "Failed to prune missing episodes"),
            }
        }
        if let Err(e) = self.store.recompute_aggregates() {
            tracing::warn!(error = %e, "Failed to recompute series aggregates");
        }

        let report = RootReport {
            path: root_path.clone(),
            discovered: discovered.load(Ordering::Relaxed),
            added: stats.added,
            updated: stats.updated,
            series_created: stats.series_created,
            failed_files: failed_files + stats.dropped,
            failed_batches: stats.failed_batches,
            walk_errors: walk.map_or(0, |w| w.errors),
            pruned,
            cancelled,
        };

        if cancelled {
            tracing::info!(root = %root_path.display(), processed = stats.processed, "Scan cancelled");
            self.bus.publish(EventPayload::ScanCancelled {
                directory_id: root.directory_id,
            });
        } else {
            tracing::info!(
                root = %root_path.display(),
                discovered = report.discovered,
                added = report.added,
                updated = report.updated,
                failed_files = report.failed_files,
                "Scan complete"
            );
            self.bus.publish(EventPayload::ScanCompleted {
                added: report.added,
                updated: report.updated,
                directory_id: root.directory_id,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use shelf_core::events::Topic;

    use crate::store::testing::FaultyStore;

    #[test]
    fn canonical_root_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(canonical_root(&dir.path().join("sub").join("..")), canonical);

        let missing = canonical_root(Path::new("not/mounted"));
        assert!(missing.is_absolute());
        assert!(missing.ends_with("not/mounted"));
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=3 {
            let path = dir.path().join(format!("Show/Show - {n:02}.mkv"));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"video").unwrap();
        }

        let store = Arc::new(FaultyStore::new());
        store.failing_upserts.store(1, Ordering::SeqCst);
        let bus = Arc::new(EventBus::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe_fn(Topic::ScanCompleted, move |event| {
            let _ = tx.send(event);
        });

        let config = ScanConfig {
            workers: 2,
            batch_size: 1,
            ..Default::default()
        };
        let scanner = Scanner::new(store.clone(), bus, config);
        let root = ScanRoot {
            path: dir.path().to_path_buf(),
            directory_id: None,
        };
        let report = scanner
            .scan_root(&root, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.discovered, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.added, 2);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for scan.completed")
            .unwrap();
        assert_eq!(
            event.payload,
            EventPayload::ScanCompleted {
                added: 2,
                updated: 0,
                directory_id: None,
            }
        );
        let series = store.list_series().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].file_count, 2);
    }
}
