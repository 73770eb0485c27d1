//! File system change aggregation for Vigil
//!
//! This crate turns the raw event streams of native file watchers into
//! calm, deduplicated reports:
//! - Debounced delivery (one callback per quiet period)
//! - Event coalescing, including rename-pair correlation
//! - Gitignore-style ignore/only filtering with live rule swaps
//! - Polling fallback when native watching is unavailable
//!
//! The entry point is [`Listener`]: point it at one or more directories,
//! register a callback with [`Listener::on_change`], and `start` it from
//! within a tokio runtime. Each delivery hands the callback three
//! disjoint, sorted path sets: `(modified, added, removed)`.

pub mod coalesce;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod listener;
pub mod record;
pub mod source;

mod debounce;

pub use config::{Config, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_FOR_DELAY, MIN_WAIT_FOR_DELAY};
pub use error::{Error, Result};
pub use event::{ChangeKind, FsProbe, NetChangeSet, PathInfo, PathProbe, RawChange};
pub use filter::Filter;
pub use listener::{Listener, State};
pub use record::{EntryMeta, FsRecord, Record};
pub use source::{EventSource, NotifySource, PollingSource};
