//! Directory walker: the producer end of the scan pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use shelf_core::{media, Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

/// Outcome of walking one root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Video files sent downstream.
    pub emitted: u64,
    /// Entries skipped because they could not be read.
    pub errors: u64,
    /// `false` when the walk stopped early (cancelled or downstream gone).
    pub complete: bool,
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

/// Walk `root` and send every video file path to `jobs`.
///
/// Blocking; run it on a blocking thread. Sending waits while `jobs` is
/// full. Per-entry errors are logged and skipped. An unreadable root is an
/// error.
pub fn walk(
    root: &Path,
    jobs: &mpsc::Sender<PathBuf>,
    cancel: &CancellationToken,
    discovered: &AtomicU64,
) -> Result<WalkStats> {
    std::fs::read_dir(root).map_err(|e| {
        Error::Io {
            source: std::io::Error::new(e.kind(), format!("{}: {e}", root.display())),
        }
    })?;

    let mut stats = WalkStats::default();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden_dir(e))
    {
        if cancel.is_cancelled() {
            tracing::info!(root = %root.display(), "Walk cancelled");
            return Ok(stats);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "Error walking directory");
                stats.errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() || !media::is_video_file(entry.path()) {
            continue;
        }

        discovered.fetch_add(1, Ordering::Relaxed);
        if jobs.blocking_send(entry.into_path()).is_err() {
            tracing::warn!(root = %root.display(), "Job stream closed; stopping walk");
            return Ok(stats);
        }
        stats.emitted += 1;
    }

    stats.complete = true;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn collect(root: &Path, cancel: &CancellationToken) -> (WalkStats, Vec<PathBuf>) {
        let (tx, mut rx) = mpsc::channel(64);
        let discovered = AtomicU64::new(0);
        let stats = walk(root, &tx, cancel, &discovered).unwrap();
        drop(tx);
        let mut paths = Vec::new();
        while let Ok(p) = rx.try_recv() {
            paths.push(p);
        }
        paths.sort();
        assert_eq!(discovered.load(Ordering::Relaxed), stats.emitted);
        (stats, paths)
    }

    #[test]
    fn emits_videos_and_skips_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Frieren/Season 1/01.mkv"));
        touch(&root.join("Frieren/Season 1/02.MP4"));
        touch(&root.join("Frieren/Season 1/01.ass"));
        touch(&root.join("Frieren/tvshow.nfo"));
        touch(&root.join(".trash/old.mkv"));
        touch(&root.join("Frieren/.thumbs/01.mkv"));

        let (stats, paths) = collect(root, &CancellationToken::new());
        assert!(stats.complete);
        assert_eq!(stats.emitted, 2);
        assert_eq!(
            paths,
            vec![
                root.join("Frieren/Season 1/01.mkv"),
                root.join("Frieren/Season 1/02.MP4"),
            ]
        );
    }

    #[test]
    fn cancelled_walk_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("A/01.mkv"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (stats, paths) = collect(dir.path(), &cancel);
        assert!(!stats.complete);
        assert!(paths.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let result = walk(
            &dir.path().join("nope"),
            &tx,
            &CancellationToken::new(),
            &AtomicU64::new(0),
        );
        assert_matches!(result, Err(Error::Io { .. }));
    }
}
