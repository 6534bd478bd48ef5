//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! library roots, scan pipeline sizing, enrichment scheduling, provider
//! credentials, and database location. Every section defaults sensibly so a
//! completely empty `{}` file is valid.
//!
//! Configuration is read once at startup and handed to components by value;
//! nothing in the core mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub scan: ScanConfig,
    pub enrichment: EnrichmentConfig,
    pub providers: ProvidersConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (i, root) in self.library.roots.iter().enumerate() {
            if !root.is_absolute() {
                warnings.push(format!(
                    "library.roots[{i}] '{}' is relative; it resolves against the working directory",
                    root.display()
                ));
            }
        }

        if self.scan.workers == 0 {
            warnings.push("scan.workers is 0; one worker will be used".into());
        }
        if self.scan.batch_size == 0 {
            warnings.push("scan.batch_size is 0; every episode is flushed individually".into());
        }
        if self.enrichment.enabled {
            if self.enrichment.workers == 0 {
                warnings.push("enrichment.workers is 0; one worker will be used".into());
            }
            if self.enrichment.queue_capacity == 0 {
                warnings.push("enrichment.queue_capacity is 0; a capacity of 1 will be used".into());
            }
            if self.providers.tmdb_api_key.is_none() {
                warnings.push(
                    "enrichment is enabled but providers.tmdb_api_key is not set; only local assets will be used"
                        .into(),
                );
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Library roots scanned in addition to registered directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub roots: Vec<PathBuf>,
}

/// Scan pipeline sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of concurrent classification workers.
    pub workers: usize,
    /// Episodes accumulated before one bulk upsert.
    pub batch_size: usize,
    /// Capacity of the walker → worker job channel.
    pub job_capacity: usize,
    /// Capacity of the worker → aggregator result channel.
    pub result_capacity: usize,
    /// Files aggregated between two progress events.
    pub progress_interval: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            batch_size: 100,
            job_capacity: 1000,
            result_capacity: 1000,
            progress_interval: 50,
        }
    }
}

/// Enrichment scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Pause before every provider call, in milliseconds.
    pub rate_limit_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 2,
            queue_capacity: 1000,
            rate_limit_ms: 500,
        }
    }
}

/// Metadata provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub tmdb_api_key: Option<String>,
    #[serde(default = "default_language")]
    pub tmdb_language: String,
    /// Override for the TMDB API base URL (used by tests and proxies).
    pub tmdb_base_url: Option<String>,
}

fn default_language() -> String {
    "en-US".into()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_language: default_language(),
            tmdb_base_url: None,
        }
    }
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/animeshelf.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert!(cfg.library.roots.is_empty());
        assert_eq!(cfg.scan.workers, 8);
        assert_eq!(cfg.scan.batch_size, 100);
        assert_eq!(cfg.enrichment.workers, 2);
        assert_eq!(cfg.enrichment.queue_capacity, 1000);
        assert_eq!(cfg.enrichment.rate_limit_ms, 500);
        assert_eq!(cfg.providers.tmdb_language, "en-US");
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"library": {"roots": ["/lib"]}, "scan": {"workers": 2}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.library.roots, vec![PathBuf::from("/lib")]);
        assert_eq!(cfg.scan.workers, 2);
        assert_eq!(cfg.scan.batch_size, 100);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.scan.workers, 8);
        assert!(cfg.enrichment.enabled);
    }

    #[test]
    fn parse_invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None);
        assert_eq!(cfg.scan.workers, 8);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/config.json")));
        assert_eq!(cfg.scan.workers, 8);
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"enrichment": {"rate_limit_ms": 10}}"#).unwrap();
        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.enrichment.rate_limit_ms, 10);
    }

    #[test]
    fn missing_api_key_warns() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("tmdb_api_key")));
    }

    #[test]
    fn relative_root_warns() {
        let mut cfg = Config::default();
        cfg.providers.tmdb_api_key = Some("key".into());
        cfg.library.roots.push(PathBuf::from("anime"));
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("relative"));
    }

    #[test]
    fn zero_workers_warns() {
        let mut cfg = Config::default();
        cfg.providers.tmdb_api_key = Some("key".into());
        cfg.scan.workers = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("scan.workers")));
    }
}
