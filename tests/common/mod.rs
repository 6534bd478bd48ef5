//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary library root, an
//! in-memory database and a [`Library`] wired to both.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use animeshelf::app::Library;
use animeshelf::scanner::{ScanReport, ScanRoot};
use shelf_core::config::Config;
use shelf_core::events::{Event, Topic};
use shelf_db::models::{Episode, Series};
use shelf_db::pool::init_memory_pool;
use shelf_db::queries::{episodes, series};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Test harness wrapping a [`Library`] over a temporary directory tree.
pub struct TestHarness {
    pub library: Library,
    pub dir: TempDir,
    root: PathBuf,
}

impl TestHarness {
    /// Harness with default settings and the temp dir as the only root.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Harness whose config is adjusted by `tweak` before opening.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        let root = dir.path().canonicalize().expect("failed to canonicalize temp dir");
        config.library.roots = vec![root.clone()];
        config.enrichment.rate_limit_ms = 1;
        tweak(&mut config);

        let pool = init_memory_pool().expect("failed to create in-memory pool");
        let library = Library::with_pool(config, pool).expect("failed to open library");
        Self { library, dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `rel` under the root with `size` bytes of content.
    pub fn touch_sized(&self, rel: &str, size: usize) -> PathBuf {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    pub fn touch(&self, rel: &str) -> PathBuf {
        self.touch_sized(rel, 16)
    }

    /// The registered root for the temp dir.
    pub fn scan_root(&self) -> ScanRoot {
        self.library
            .registered_roots()
            .unwrap()
            .into_iter()
            .find(|r| r.path == self.root())
            .expect("temp root should be registered")
    }

    /// Scan the temp root without enrichment.
    pub async fn scan(&self) -> ScanReport {
        self.library
            .scan(&[self.scan_root()], None, &CancellationToken::new())
            .await
    }

    pub fn series(&self) -> Vec<Series> {
        let conn = self.library.store().pool().get().unwrap();
        series::list_series(&conn).unwrap()
    }

    pub fn series_at(&self, rel: &str) -> Option<Series> {
        let conn = self.library.store().pool().get().unwrap();
        let path = self.root().join(rel);
        series::find_series_by_path(&conn, &path.to_string_lossy()).unwrap()
    }

    pub fn episode_at(&self, rel: &str) -> Option<Episode> {
        let conn = self.library.store().pool().get().unwrap();
        let path = self.root().join(rel);
        episodes::get_episode_by_path(&conn, &path.to_string_lossy()).unwrap()
    }

    pub fn episode_count(&self) -> i64 {
        let conn = self.library.store().pool().get().unwrap();
        episodes::count_episodes(&conn).unwrap()
    }

    /// Collect every event published on `topic` into a channel.
    pub fn listen(&self, topic: Topic) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.library.bus().subscribe_fn(topic, move |event| {
            let _ = tx.send(event);
        });
        rx
    }
}

/// Drain whatever has arrived on `rx` after giving handlers a moment to run.
pub async fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}
