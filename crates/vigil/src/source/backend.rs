//! notify-backed event source
//!
//! Translates notify's platform events into `RawChange` records. Rename
//! halves keep their kernel tracker id as the correlation cookie; a
//! single `Both` event is split into a MovedFrom/MovedTo pair sharing a
//! synthesized cookie.

use super::EventSource;
use crate::error::{Error, Result};
use crate::event::RawChange;
use crossbeam_channel::Sender;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

// Synthesized cookies live above the kernel's u32 cookie space so the two
// can never collide within a batch.
static SYNTHETIC_COOKIE: AtomicU64 = AtomicU64::new(1 << 32);

/// Recursive native watches over the configured directories.
pub struct NotifySource {
    dirs: Vec<PathBuf>,
    watcher: Option<RecommendedWatcher>,
}

impl NotifySource {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            watcher: None,
        }
    }
}

impl EventSource for NotifySource {
    fn start(&mut self, queue: Sender<RawChange>) -> Result<()> {
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    trace!("Raw notify event: {:?}", event);
                    for change in map_event(event) {
                        if queue.send(change).is_err() {
                            // Consumer side is gone; the listener stopped.
                            return;
                        }
                    }
                }
                Err(e) => warn!("Watch backend error: {}", e),
            },
            NotifyConfig::default(),
        )
        .map_err(Error::WatchSource)?;

        for dir in &self.dirs {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(Error::WatchSource)?;
        }

        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the watcher tears down the OS watches.
        self.watcher.take();
    }
}

fn map_event(event: Event) -> Vec<RawChange> {
    let cookie = event.attrs.tracker().map(|t| t as u64);
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(RawChange::added).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(RawChange::removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => map_rename(mode, event.paths, cookie),
        EventKind::Modify(_) => event.paths.into_iter().map(RawChange::modified).collect(),
        // Access and unclassified events carry no net change.
        _ => vec![],
    }
}

fn map_rename(mode: RenameMode, paths: Vec<PathBuf>, cookie: Option<u64>) -> Vec<RawChange> {
    match mode {
        RenameMode::From => paths
            .into_iter()
            .map(|path| RawChange::moved_from(path, cookie))
            .collect(),
        RenameMode::To => paths
            .into_iter()
            .map(|path| RawChange::moved_to(path, cookie))
            .collect(),
        RenameMode::Both => {
            let mut paths = paths.into_iter();
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => {
                    let cookie = cookie
                        .unwrap_or_else(|| SYNTHETIC_COOKIE.fetch_add(1, Ordering::Relaxed));
                    vec![
                        RawChange::moved_from(from, cookie),
                        RawChange::moved_to(to, cookie),
                    ]
                }
                (Some(only), None) => vec![RawChange::modified(only)],
                _ => vec![],
            }
        }
        // FSEvents-style unqualified rename halves: current existence
        // tells the halves apart.
        _ => paths
            .into_iter()
            .map(|path| {
                if path.exists() {
                    RawChange::moved_to(path, cookie)
                } else {
                    RawChange::moved_from(path, cookie)
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    #[test]
    fn test_create_maps_to_added() {
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path("/w/a.txt".into());
        let changes = map_event(event);
        assert_eq!(changes, vec![RawChange::added("/w/a.txt")]);
    }

    #[test]
    fn test_data_change_maps_to_modified() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/w/a.txt".into());
        let changes = map_event(event);
        assert_eq!(changes, vec![RawChange::modified("/w/a.txt")]);
    }

    #[test]
    fn test_remove_maps_to_removed() {
        let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/w/a.txt".into());
        let changes = map_event(event);
        assert_eq!(changes, vec![RawChange::removed("/w/a.txt")]);
    }

    #[test]
    fn test_rename_halves_share_tracker_cookie() {
        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path("/w/old.txt".into())
            .set_tracker(42);
        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path("/w/new.txt".into())
            .set_tracker(42);

        let from = map_event(from);
        let to = map_event(to);
        assert_eq!(from, vec![RawChange::moved_from("/w/old.txt", 42)]);
        assert_eq!(to, vec![RawChange::moved_to("/w/new.txt", 42)]);
    }

    #[test]
    fn test_rename_both_splits_into_cookied_pair() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/w/old.txt".into())
            .add_path("/w/new.txt".into());

        let changes = map_event(event);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::MovedFrom);
        assert_eq!(changes[1].kind, ChangeKind::MovedTo);
        assert!(changes[0].cookie.is_some());
        assert_eq!(changes[0].cookie, changes[1].cookie);
    }

    #[test]
    fn test_access_is_silent() {
        let event =
            Event::new(EventKind::Access(AccessKind::Any)).add_path("/w/a.txt".into());
        assert!(map_event(event).is_empty());
    }
}
