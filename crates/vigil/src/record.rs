//! Known-path snapshot of the watched directories
//!
//! The listener rebuilds this snapshot at `start` and at `unpause`, so a
//! resumed listener reports changes against a fresh baseline instead of
//! retroactively reporting everything that happened while paused.

use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Capability interface for the snapshot collaborator.
///
/// Kept abstract so tests can count rebuilds without touching the
/// filesystem.
pub trait Record: Send {
    /// (Re)compute the known-path snapshot from disk.
    fn build(&mut self) -> Result<()>;
}

/// Metadata captured per known path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    pub len: u64,
    pub mtime: Option<SystemTime>,
}

/// Filesystem-backed snapshot of every path under the watched roots.
pub struct FsRecord {
    roots: Vec<PathBuf>,
    entries: HashMap<PathBuf, EntryMeta>,
}

impl FsRecord {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            entries: HashMap::new(),
        }
    }

    /// Number of known paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&EntryMeta> {
        self.entries.get(path)
    }
}

impl Record for FsRecord {
    fn build(&mut self) -> Result<()> {
        let mut entries = HashMap::new();

        for root in &self.roots {
            for entry in WalkDir::new(root).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        // A path that vanished mid-scan is not fatal.
                        warn!("Skipping unreadable path during snapshot: {}", e);
                        continue;
                    }
                };
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                entries.insert(
                    entry.path().to_path_buf(),
                    EntryMeta {
                        is_dir: metadata.is_dir(),
                        len: metadata.len(),
                        mtime: metadata.modified().ok(),
                    },
                );
            }
        }

        debug!("Record snapshot rebuilt: {} known paths", entries.len());
        self.entries = entries;
        Ok(())
    }
}
