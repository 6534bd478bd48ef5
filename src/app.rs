//! Wiring of store, bus, scanner and enrichment for one process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shelf_core::config::{Config, ProvidersConfig};
use shelf_core::events::EventBus;
use shelf_core::{Result, SeriesId};
use shelf_db::pool::{init_pool, DbPool};
use tokio_util::sync::CancellationToken;

use crate::enrichment::providers::TmdbProvider;
use crate::enrichment::{EnrichmentScheduler, MetadataProvider, ProviderRegistry};
use crate::scanner::{canonical_root, ScanReport, ScanRoot, Scanner};
use crate::store::{CatalogStore, SqliteStore};

/// An opened media library.
pub struct Library {
    config: Config,
    store: Arc<SqliteStore>,
    bus: Arc<EventBus>,
}

impl Library {
    /// Open the database named by `config` and register the configured
    /// roots as directories.
    pub fn open(config: Config) -> Result<Self> {
        let pool = init_pool(&config.database.path)?;
        Self::with_pool(config, pool)
    }

    /// Like [`open`](Self::open), on an existing pool.
    pub fn with_pool(config: Config, pool: DbPool) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(pool));
        for root in &config.library.roots {
            store.add_directory(&canonical_root(root).to_string_lossy(), None)?;
        }
        Ok(Self {
            config,
            store,
            bus: Arc::new(EventBus::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        self.store.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Every registered directory, configured roots included.
    pub fn registered_roots(&self) -> Result<Vec<ScanRoot>> {
        Ok(self
            .store
            .list_directories()?
            .into_iter()
            .map(|d| ScanRoot {
                path: PathBuf::from(d.path),
                directory_id: Some(d.id),
            })
            .collect())
    }

    /// Scan roots for explicit paths, in canonical form and tied to their
    /// directory row when one is registered.
    pub fn roots_for(&self, paths: &[PathBuf]) -> Result<Vec<ScanRoot>> {
        let registered = self.registered_roots()?;
        Ok(paths
            .iter()
            .map(|p| {
                let path = canonical_root(p);
                registered
                    .iter()
                    .find(|r| r.path == path)
                    .cloned()
                    .unwrap_or(ScanRoot {
                        path,
                        directory_id: None,
                    })
            })
            .collect())
    }

    /// The provider set described by the configuration.
    pub fn providers(&self) -> Arc<dyn MetadataProvider> {
        Arc::new(build_registry(&self.config.providers))
    }

    /// Run one scan. When `provider` is given and enrichment is enabled,
    /// discovered series are enriched alongside and the call returns once
    /// the enrichment queue has drained too.
    pub async fn scan(
        &self,
        roots: &[ScanRoot],
        provider: Option<Arc<dyn MetadataProvider>>,
        cancel: &CancellationToken,
    ) -> ScanReport {
        let store: Arc<dyn CatalogStore> = self.store.clone();
        let scanner = Scanner::new(store.clone(), self.bus.clone(), self.config.scan.clone());

        match provider.filter(|_| self.config.enrichment.enabled) {
            Some(provider) => {
                let (queue, scheduler) = EnrichmentScheduler::spawn(
                    &self.config.enrichment,
                    store,
                    provider,
                    self.bus.clone(),
                    cancel.clone(),
                );
                let scanner = scanner.with_enrichment(queue);
                let report = scanner.scan(roots, cancel).await;
                drop(scanner);
                scheduler.join().await;
                report
            }
            None => scanner.scan(roots, cancel).await,
        }
    }

    /// Queue `series` (or every series when empty) for enrichment and wait
    /// for the workers to finish. Returns the number submitted.
    pub async fn enrich(
        &self,
        series: &[SeriesId],
        provider: Arc<dyn MetadataProvider>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let ids: Vec<SeriesId> = if series.is_empty() {
            self.store.list_series()?.into_iter().map(|s| s.id).collect()
        } else {
            series.to_vec()
        };

        let (queue, scheduler) = EnrichmentScheduler::spawn(
            &self.config.enrichment,
            self.store.clone(),
            provider,
            self.bus.clone(),
            cancel.clone(),
        );
        let mut submitted = 0;
        for id in ids {
            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = queue.submit(id) => {
                    sent?;
                    submitted += 1;
                }
            }
        }
        drop(queue);
        scheduler.join().await;
        Ok(submitted)
    }

    /// Path of the database file in use.
    pub fn database_path(&self) -> &Path {
        &self.config.database.path
    }
}

/// Build the provider registry from configuration. Providers without
/// credentials are registered but unavailable.
pub fn build_registry(config: &ProvidersConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let mut tmdb = TmdbProvider::new(
        config.tmdb_api_key.clone().unwrap_or_default(),
        config.tmdb_language.clone(),
    );
    if let Some(base) = &config.tmdb_base_url {
        tmdb = tmdb.with_base_url(base.clone());
    }
    registry.register(Arc::new(tmdb));
    registry
}
