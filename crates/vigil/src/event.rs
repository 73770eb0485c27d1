//! Raw change records and coalesced net change sets

use std::fs;
use std::path::{Path, PathBuf};

/// Kind of one observed filesystem event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Path created
    Added,
    /// Path contents or metadata changed
    Modified,
    /// Path deleted
    Removed,
    /// Source half of a rename
    MovedFrom,
    /// Destination half of a rename
    MovedTo,
}

impl ChangeKind {
    /// True for kinds that describe a path going away.
    pub fn is_removal(self) -> bool {
        matches!(self, ChangeKind::Removed | ChangeKind::MovedFrom)
    }
}

/// One unprocessed filesystem notification.
///
/// A `MovedFrom`/`MovedTo` pair produced by a single rename shares a
/// `cookie`; at most one of each may carry a given cookie within a batch.
/// Non-move events never carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub cookie: Option<u64>,
}

impl RawChange {
    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Added,
            path: path.into(),
            cookie: None,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Modified,
            path: path.into(),
            cookie: None,
        }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Removed,
            path: path.into(),
            cookie: None,
        }
    }

    pub fn moved_from(path: impl Into<PathBuf>, cookie: impl Into<Option<u64>>) -> Self {
        Self {
            kind: ChangeKind::MovedFrom,
            path: path.into(),
            cookie: cookie.into(),
        }
    }

    pub fn moved_to(path: impl Into<PathBuf>, cookie: impl Into<Option<u64>>) -> Self {
        Self {
            kind: ChangeKind::MovedTo,
            path: path.into(),
            cookie: cookie.into(),
        }
    }
}

/// The coalescing result for one delivery.
///
/// The three sets are disjoint: a path appears in at most one of them.
/// Each set is sorted before delivery so consumers see deterministic
/// output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetChangeSet {
    pub modified: Vec<PathBuf>,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl NetChangeSet {
    /// True when no path survived coalescing. An all-empty set is a valid
    /// no-op result and is never delivered to the callback.
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of paths across the three sets.
    pub fn len(&self) -> usize {
        self.modified.len() + self.added.len() + self.removed.len()
    }
}

/// Current on-disk state of one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathInfo {
    pub exists: bool,
    pub is_dir: bool,
}

/// Answers "does this path currently exist, and what kind is it".
///
/// The coalescer queries each distinct path at most once per reduction.
pub trait PathProbe {
    fn probe(&self, path: &Path) -> PathInfo;
}

/// Probe backed by the real filesystem.
///
/// I/O errors count as absent: a path we cannot stat is treated as gone,
/// which drops transient entries rather than over-reporting them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn probe(&self, path: &Path) -> PathInfo {
        match fs::symlink_metadata(path) {
            Ok(meta) => PathInfo {
                exists: true,
                is_dir: meta.is_dir(),
            },
            Err(_) => PathInfo::default(),
        }
    }
}
