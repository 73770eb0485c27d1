//! Polling fallback source
//!
//! Rescans the watched directories on an interval and diffs an mtime/len
//! snapshot into Added/Modified/Removed records. Used when native watch
//! mechanisms are unavailable or when polling is forced.

use super::EventSource;
use crate::error::Result;
use crate::event::RawChange;
use crossbeam_channel::{SendError, Sender};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    mtime: Option<SystemTime>,
    len: u64,
    is_dir: bool,
}

type Snapshot = HashMap<PathBuf, Stamp>;

/// Interval scanner over the watched directories.
pub struct PollingSource {
    dirs: Vec<PathBuf>,
    interval: Duration,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollingSource {
    pub fn new(dirs: Vec<PathBuf>, interval: Duration) -> Self {
        Self {
            dirs,
            interval,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl EventSource for PollingSource {
    fn start(&mut self, queue: Sender<RawChange>) -> Result<()> {
        let dirs = self.dirs.clone();
        let interval = self.interval;
        let stop = Arc::clone(&self.stop);

        info!("Polling for changes (interval: {:?})", interval);

        self.handle = Some(tokio::spawn(async move {
            let mut previous = scan(&dirs);
            loop {
                tokio::time::sleep(interval).await;
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let current = scan(&dirs);
                if emit_diff(&previous, &current, &queue).is_err() {
                    // Consumer side is gone; the listener stopped.
                    break;
                }
                previous = current;
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn scan(dirs: &[PathBuf]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for dir in dirs {
        for entry in WalkDir::new(dir).follow_links(false).into_iter().flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            snapshot.insert(
                entry.path().to_path_buf(),
                Stamp {
                    mtime: metadata.modified().ok(),
                    len: metadata.len(),
                    is_dir: metadata.is_dir(),
                },
            );
        }
    }
    snapshot
}

fn emit_diff(
    previous: &Snapshot,
    current: &Snapshot,
    queue: &Sender<RawChange>,
) -> std::result::Result<(), SendError<RawChange>> {
    for (path, stamp) in current {
        match previous.get(path) {
            None => queue.send(RawChange::added(path.clone()))?,
            // Directory mtimes churn whenever children change; child
            // entries already carry that signal.
            Some(old) if old != stamp && !stamp.is_dir => {
                queue.send(RawChange::modified(path.clone()))?
            }
            _ => {}
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            queue.send(RawChange::removed(path.clone()))?;
        }
    }
    Ok(())
}
