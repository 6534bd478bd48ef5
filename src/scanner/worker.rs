//! Classification workers: stat, classify and resolve each walked path.

use std::path::PathBuf;
use std::sync::Arc;

use shelf_parser::ParsedEpisode;
use tokio::sync::{mpsc, Mutex};

use super::resolver::{resolve_series_root, SeriesRoot};

/// A classified file on its way to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub path: PathBuf,
    pub size: u64,
    pub parsed: ParsedEpisode,
    pub series: SeriesRoot,
}

/// Classify a file whose size is already known. A season folder overrides
/// whatever season the file name encodes.
pub fn build_record(path: PathBuf, size: u64) -> Option<ScanRecord> {
    let series = resolve_series_root(&path)?;
    let mut parsed = shelf_parser::classify(&path);
    if let Some(season) = series.season {
        parsed.season = season;
    }
    Some(ScanRecord {
        path,
        size,
        parsed,
        series,
    })
}

/// Drain `jobs` until it closes, forwarding records to `results`.
///
/// Returns the number of files dropped because they could not be stat'ed
/// or placed in a series.
pub async fn run_worker(
    n: usize,
    jobs: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    results: mpsc::Sender<ScanRecord>,
) -> u64 {
    let mut dropped = 0;
    loop {
        let next = {
            let mut guard = jobs.lock().await;
            guard.recv().await
        };
        let Some(path) = next else { break };

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(worker = n, file = %path.display(), error = %e, "Failed to stat file");
                dropped += 1;
                continue;
            }
        };

        let Some(record) = build_record(path.clone(), size) else {
            tracing::warn!(worker = n, file = %path.display(), "No series directory for file");
            dropped += 1;
            continue;
        };

        if results.send(record).await.is_err() {
            tracing::warn!(worker = n, "Result stream closed; stopping worker");
            break;
        }
    }
    dropped
}
