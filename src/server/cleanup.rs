//! Periodic removal of old uploads and generated outputs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;

/// Delete regular files directly inside `dir` last modified more than
/// `max_age` before `now`.
///
/// A missing directory counts as empty. Returns the number of files removed.
pub fn prune_dir(dir: &Path, max_age: Duration, now: SystemTime) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }

        let expired = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);
        if !expired {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            // raced with another removal
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), "Could not remove expired file: {e}")
            }
        }
    }

    Ok(removed)
}

/// Start a background task pruning `dirs` every `interval`.
///
/// Returns a shutdown sender; sending `true` stops the task.
pub fn start_cleanup_task(
    dirs: Vec<PathBuf>,
    max_age: Duration,
    interval: Duration,
) -> watch::Sender<bool> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    let dirs = dirs.clone();
                    let pruned = tokio::task::spawn_blocking(move || prune_all(&dirs, max_age)).await;
                    if let Err(e) = pruned {
                        tracing::warn!("Cleanup run failed: {e}");
                    }
                }
                changed = shutdown_rx.changed() => {
                    // a dropped sender also stops the task
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Cleanup task shutting down");
                        break;
                    }
                }
            }
        }
    });

    shutdown_tx
}

fn prune_all(dirs: &[PathBuf], max_age: Duration) {
    let now = SystemTime::now();
    for dir in dirs {
        match prune_dir(dir, max_age, now) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(dir = %dir.display(), removed, "Removed expired files"),
            Err(e) => tracing::warn!(dir = %dir.display(), "Cleanup failed: {e}"),
        }
    }
}
