//! Batch reduction of raw changes into a net change set
//!
//! A burst of raw events (an editor save, a temp-file rename, a double
//! move) collapses into at most one net classification per path. The
//! reducer is pure over its inputs: the batch, one filter snapshot, and
//! an existence probe queried at most once per distinct path.

use crate::event::{ChangeKind, NetChangeSet, PathInfo, PathProbe, RawChange};
use crate::filter::Filter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetKind {
    Modified,
    Added,
    Removed,
}

#[derive(Default)]
struct MoveGroup {
    from: Option<PathBuf>,
    to: Option<PathBuf>,
}

/// Memoizes probe answers so each distinct path hits the filesystem once.
struct ProbeCache<'a> {
    probe: &'a dyn PathProbe,
    seen: HashMap<PathBuf, PathInfo>,
}

impl<'a> ProbeCache<'a> {
    fn new(probe: &'a dyn PathProbe) -> Self {
        Self {
            probe,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, path: &Path) -> PathInfo {
        if let Some(info) = self.seen.get(path) {
            return *info;
        }
        let info = self.probe.probe(path);
        self.seen.insert(path.to_path_buf(), info);
        info
    }
}

/// Reduce one debounce batch into its minimal net change set.
///
/// Classification rules:
/// - Simple (non-correlated) events are grouped by path and decided by
///   final on-disk existence, not the intermediate kinds: an existing
///   path is `added` only when its whole history is a single `Added`,
///   otherwise `modified`; a vanished path is `removed` only when every
///   event was a removal, otherwise it is dropped entirely.
/// - A rename pair sharing a cookie reports only the destination:
///   `added` when the source was visible, `modified` when the source was
///   filtered (the ignored-temp-file save pattern). A filtered
///   destination drops the pair. An orphaned rename-in is `added`; an
///   orphaned rename-out falls back to the simple removal rules.
/// - Suppressed paths never enter the result; a later verdict for a path
///   overwrites an earlier one, keeping the three sets disjoint.
pub fn reduce(batch: &[RawChange], filter: &Filter, probe: &dyn PathProbe) -> NetChangeSet {
    let mut simple_order: Vec<PathBuf> = Vec::new();
    let mut simple: HashMap<PathBuf, Vec<ChangeKind>> = HashMap::new();
    let mut cookie_order: Vec<u64> = Vec::new();
    let mut moves: HashMap<u64, MoveGroup> = HashMap::new();

    for change in batch {
        match (change.kind, change.cookie) {
            (ChangeKind::MovedFrom, Some(cookie)) => {
                let group = moves.entry(cookie).or_insert_with(|| {
                    cookie_order.push(cookie);
                    MoveGroup::default()
                });
                group.from = Some(change.path.clone());
            }
            (ChangeKind::MovedTo, Some(cookie)) => {
                let group = moves.entry(cookie).or_insert_with(|| {
                    cookie_order.push(cookie);
                    MoveGroup::default()
                });
                group.to = Some(change.path.clone());
            }
            // Cookieless moves carry no pairing information and are
            // classified through the simple per-path rules.
            _ => {
                simple
                    .entry(change.path.clone())
                    .or_insert_with(|| {
                        simple_order.push(change.path.clone());
                        Vec::new()
                    })
                    .push(change.kind);
            }
        }
    }

    let mut cache = ProbeCache::new(probe);
    let mut net: HashMap<PathBuf, NetKind> = HashMap::new();

    // Simple paths first, in arrival order; filtered once per path prior
    // to classification.
    for path in simple_order {
        let kinds = &simple[&path];
        let info = cache.get(&path);
        if filter.suppress(&path, info.is_dir) {
            continue;
        }
        if let Some(kind) = classify_simple(kinds, info.exists) {
            net.insert(path, kind);
        }
    }

    // Rename groups second; a move verdict for a path overwrites any
    // simple verdict from the same batch.
    for cookie in cookie_order {
        let MoveGroup { from, to } = moves.remove(&cookie).unwrap_or_default();
        match (from, to) {
            (from, Some(to)) => {
                let to_info = cache.get(&to);
                if filter.suppress(&to, to_info.is_dir) {
                    // Hidden destination drops the whole pair.
                    continue;
                }
                let from_filtered = match &from {
                    Some(from) => {
                        let from_info = cache.get(from);
                        filter.suppress(from, from_info.is_dir)
                    }
                    // Orphaned rename-in: something appeared under a new
                    // name, report it as added.
                    None => false,
                };
                if from_filtered {
                    // Rename out of an ignored path is an in-place content
                    // update of the destination.
                    net.insert(to, NetKind::Modified);
                } else {
                    net.insert(to, NetKind::Added);
                }
            }
            (Some(from), None) => {
                // Orphaned rename-out: the path left the batch's view;
                // classify like a lone removal.
                let info = cache.get(&from);
                if filter.suppress(&from, info.is_dir) {
                    continue;
                }
                if let Some(kind) = classify_simple(&[ChangeKind::MovedFrom], info.exists) {
                    net.insert(from, kind);
                }
            }
            (None, None) => {}
        }
    }

    let mut set = NetChangeSet::default();
    for (path, kind) in net {
        match kind {
            NetKind::Modified => set.modified.push(path),
            NetKind::Added => set.added.push(path),
            NetKind::Removed => set.removed.push(path),
        }
    }
    set.modified.sort();
    set.added.sort();
    set.removed.sort();
    set
}

/// Net classification for one path's event history.
///
/// Final existence wins over the event sequence: a path that exists is a
/// modification unless its only event was a single creation; a path that
/// vanished is silent unless every event described a removal.
fn classify_simple(kinds: &[ChangeKind], exists: bool) -> Option<NetKind> {
    if exists {
        if kinds.len() == 1 && kinds[0] == ChangeKind::Added {
            Some(NetKind::Added)
        } else {
            Some(NetKind::Modified)
        }
    } else if !kinds.is_empty() && kinds.iter().all(|kind| kind.is_removal()) {
        Some(NetKind::Removed)
    } else {
        None
    }
}
