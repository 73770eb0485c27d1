//! Listener lifecycle and public control surface
//!
//! The listener owns the filter snapshot, the lifecycle state flag, the
//! registered callback, and its collaborators (event source, record
//! snapshot, aggregation loop task). It is responsible for their startup
//! and shutdown ordering; collaborator failures surface as typed errors.

use crate::config::Config;
use crate::debounce::DebounceLoop;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::record::{FsRecord, Record};
use crate::source::{self, EventSource};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Listener lifecycle state.
///
/// `Created -> Running` on start; `Running <-> Paused` on pause/unpause;
/// `Running`/`Paused -> Stopping -> Stopped` on stop. Nothing leaves
/// `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Running,
    Paused,
    Stopping,
    Stopped,
}

pub(crate) type ChangeCallback =
    Arc<dyn Fn(Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>) + Send + Sync>;

/// State shared between the listener and the aggregation loop.
///
/// The state flag and the filter slot are single-writer (the listener)
/// multi-reader (the loop); the filter is always published as a whole
/// `Arc<Filter>` snapshot, never edited in place.
pub(crate) struct Shared {
    pub(crate) config: Config,
    state: RwLock<State>,
    filter: RwLock<Arc<Filter>>,
    callback: RwLock<Option<ChangeCallback>>,
}

impl Shared {
    pub(crate) fn new(config: Config) -> Result<Arc<Self>> {
        let filter = Arc::new(Filter::from_config(&config)?);
        Ok(Arc::new(Self {
            config,
            state: RwLock::new(State::Created),
            filter: RwLock::new(filter),
            callback: RwLock::new(None),
        }))
    }

    pub(crate) fn state(&self) -> State {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: State) {
        *self.state.write() = state;
    }

    pub(crate) fn filter(&self) -> Arc<Filter> {
        Arc::clone(&self.filter.read())
    }

    pub(crate) fn set_filter(&self, filter: Arc<Filter>) {
        *self.filter.write() = filter;
    }

    pub(crate) fn callback(&self) -> Option<ChangeCallback> {
        self.callback.read().clone()
    }

    pub(crate) fn register_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>) + Send + Sync + 'static,
    {
        let mut slot = self.callback.write();
        if slot.is_some() {
            return Err(Error::CallbackAlreadyRegistered);
        }
        *slot = Some(Arc::new(callback));
        Ok(())
    }
}

/// Watches a set of directories and delivers one coalesced net change
/// set per quiet period to the registered callback.
///
/// ```no_run
/// use vigil::{Config, Listener};
///
/// # async fn demo() -> vigil::Result<()> {
/// let mut listener = Listener::new(["/some/project"], Config::default())?;
/// listener.on_change(|modified, added, removed| {
///     println!("~{modified:?} +{added:?} -{removed:?}");
/// })?;
/// listener.start()?;
/// // ... later
/// listener.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct Listener {
    directories: Vec<PathBuf>,
    shared: Arc<Shared>,
    source: Option<Box<dyn EventSource>>,
    record: Box<dyn Record>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("directories", &self.directories)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl Listener {
    /// Create a listener over `directories`.
    ///
    /// Directories are normalized to absolute, symlink-resolved paths; a
    /// missing path or a non-directory is `InvalidConfiguration`, as are
    /// invalid option values and malformed ignore/only patterns.
    pub fn new<I, P>(directories: I, config: Config) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        config.validate()?;

        let directories = directories
            .into_iter()
            .map(|dir| {
                let dir = dir.as_ref();
                let resolved = fs::canonicalize(dir).map_err(|e| {
                    Error::InvalidConfiguration(format!(
                        "cannot resolve watch directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
                if !resolved.is_dir() {
                    return Err(Error::InvalidConfiguration(format!(
                        "{} is not a directory",
                        resolved.display()
                    )));
                }
                Ok(resolved)
            })
            .collect::<Result<Vec<_>>>()?;

        let record = Box::new(FsRecord::new(directories.clone()));
        let shared = Shared::new(config)?;

        Ok(Self {
            directories,
            shared,
            source: None,
            record,
            task: None,
        })
    }

    /// Substitute the raw event source (used by tests and embedders with
    /// their own watch strategy). Takes effect at `start`.
    pub fn with_source(mut self, source: Box<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Substitute the record snapshot collaborator.
    pub fn with_record(mut self, record: Box<dyn Record>) -> Self {
        self.record = record;
        self
    }

    /// Register the delivery callback. Exactly one may be registered; it
    /// is invoked from the aggregation loop with the three disjoint path
    /// sets `(modified, added, removed)`.
    pub fn on_change<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>) + Send + Sync + 'static,
    {
        if matches!(self.shared.state(), State::Stopping | State::Stopped) {
            return Err(Error::AlreadyStopped);
        }
        self.shared.register_callback(callback)
    }

    /// Build the initial snapshot, start the event source (without
    /// blocking), transition to `Running` and spawn the aggregation loop.
    ///
    /// Must be called from within a tokio runtime. Starting twice is
    /// `AlreadyStarted`; an empty directory set is `InvalidConfiguration`.
    pub fn start(&mut self) -> Result<()> {
        match self.shared.state() {
            State::Created => {}
            State::Running | State::Paused => return Err(Error::AlreadyStarted),
            State::Stopping | State::Stopped => return Err(Error::AlreadyStopped),
        }
        if self.directories.is_empty() {
            return Err(Error::InvalidConfiguration(
                "no directories configured".into(),
            ));
        }
        if self.shared.config.debug {
            debug!("Starting listener with config {:?}", self.shared.config);
        }

        // Baseline snapshot before any event can be observed.
        self.record.build()?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let source = match self.source.take() {
            Some(mut source) => {
                source.start(tx)?;
                source
            }
            None => source::start_source(&self.directories, &self.shared.config, tx)?,
        };
        self.source = Some(source);

        self.shared.set_state(State::Running);
        self.task = Some(tokio::spawn(
            DebounceLoop::new(rx, Arc::clone(&self.shared)).run(),
        ));

        info!(
            "Listening on {} directories (debounce window: {:?})",
            self.directories.len(),
            self.shared.config.wait_for_delay
        );
        Ok(())
    }

    /// Signal the loop and the event source to halt, await the loop, and
    /// transition to `Stopped`.
    ///
    /// Buffered-but-undelivered events are dropped. Repeated stop is a
    /// no-op; stop before start is `NotStarted`.
    pub async fn stop(&mut self) -> Result<()> {
        match self.shared.state() {
            State::Stopped => return Ok(()),
            State::Created => return Err(Error::NotStarted),
            _ => {}
        }

        self.shared.set_state(State::Stopping);
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Aggregation loop terminated abnormally: {}", e);
            }
        }
        self.shared.set_state(State::Stopped);
        info!("Listener stopped");
        Ok(())
    }

    /// Suspend delivery. Raw events observed while paused are discarded;
    /// `unpause` rebuilds the baseline snapshot instead of replaying them.
    pub fn pause(&self) -> Result<()> {
        match self.shared.state() {
            State::Running => {
                self.shared.set_state(State::Paused);
                debug!("Listener paused");
                Ok(())
            }
            State::Paused => Ok(()),
            State::Created => Err(Error::NotStarted),
            State::Stopping | State::Stopped => Err(Error::AlreadyStopped),
        }
    }

    /// Resume delivery from a fresh baseline.
    pub fn unpause(&mut self) -> Result<()> {
        match self.shared.state() {
            State::Paused => {
                // Fresh baseline so changes made while paused are not
                // retroactively reported.
                self.record.build()?;
                self.shared.set_state(State::Running);
                debug!("Listener resumed");
                Ok(())
            }
            State::Running => Ok(()),
            State::Created => Err(Error::NotStarted),
            State::Stopping | State::Stopped => Err(Error::AlreadyStopped),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state() == State::Paused
    }

    pub fn is_listening(&self) -> bool {
        self.shared.state() == State::Running
    }

    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Append patterns to the cumulative ignore set.
    pub fn ignore<I, S>(&self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate_filter(|filter| filter.with_ignores(patterns))
    }

    /// Replace the ignore rules wholesale, disabling the built-in
    /// defaults while the override is in effect.
    pub fn ignore_replace<I, S>(&self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate_filter(|filter| filter.with_override(patterns))
    }

    /// Replace the allow-list wholesale; paths are then suppressed unless
    /// they match at least one pattern.
    pub fn only<I, S>(&self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate_filter(|filter| filter.with_only(patterns))
    }

    /// Build the next snapshot from the current one and publish it
    /// atomically for the aggregation loop.
    fn mutate_filter(&self, mutate: impl FnOnce(&Filter) -> Result<Filter>) -> Result<()> {
        match self.shared.state() {
            State::Created => return Err(Error::NotStarted),
            State::Stopping | State::Stopped => return Err(Error::AlreadyStopped),
            _ => {}
        }
        let current = self.shared.filter();
        let next = mutate(&current)?;
        self.shared.set_filter(Arc::new(next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawChange;
    use crossbeam_channel::Sender;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Source double that never produces anything but keeps the channel
    /// alive.
    struct IdleSource {
        _queue: Option<Sender<RawChange>>,
    }

    impl IdleSource {
        fn boxed() -> Box<dyn EventSource> {
            Box::new(Self { _queue: None })
        }
    }

    impl EventSource for IdleSource {
        fn start(&mut self, queue: Sender<RawChange>) -> Result<()> {
            self._queue = Some(queue);
            Ok(())
        }

        fn stop(&mut self) {
            self._queue = None;
        }
    }

    /// Record double counting snapshot rebuilds.
    struct CountingRecord {
        builds: Arc<AtomicUsize>,
    }

    impl Record for CountingRecord {
        fn build(&mut self) -> Result<()> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn listener(temp_dir: &TempDir) -> Listener {
        Listener::new([temp_dir.path()], Config::default())
            .unwrap()
            .with_source(IdleSource::boxed())
    }

    #[test]
    fn test_new_rejects_missing_directory() {
        let err = Listener::new(["/definitely/not/a/real/dir"], Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_new_rejects_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        let err = Listener::new([&file], Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_start_requires_directories() {
        let mut listener = Listener::new(Vec::<PathBuf>::new(), Config::default()).unwrap();
        assert!(matches!(
            listener.start(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_state_queries() {
        let temp_dir = TempDir::new().unwrap();
        let mut listener = listener(&temp_dir);

        assert_eq!(listener.state(), State::Created);
        assert!(!listener.is_listening());
        assert!(!listener.is_paused());

        listener.start().unwrap();
        assert!(listener.is_listening());
        assert!(!listener.is_paused());

        listener.pause().unwrap();
        assert!(listener.is_paused());
        assert!(!listener.is_listening());

        listener.unpause().unwrap();
        assert!(listener.is_listening());

        listener.stop().await.unwrap();
        assert_eq!(listener.state(), State::Stopped);
        assert!(!listener.is_listening());
        assert!(!listener.is_paused());
    }

    #[tokio::test]
    async fn test_double_start_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut listener = listener(&temp_dir);
        listener.start().unwrap();
        assert!(matches!(listener.start(), Err(Error::AlreadyStarted)));
        listener.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_before_start_fail() {
        let temp_dir = TempDir::new().unwrap();
        let mut listener = listener(&temp_dir);

        assert!(matches!(listener.pause(), Err(Error::NotStarted)));
        assert!(matches!(listener.unpause(), Err(Error::NotStarted)));
        assert!(matches!(
            listener.ignore(["*.log"]),
            Err(Error::NotStarted)
        ));
        assert!(matches!(listener.only(["*.rs"]), Err(Error::NotStarted)));
        assert!(matches!(listener.stop().await, Err(Error::NotStarted)));
    }

    #[tokio::test]
    async fn test_operations_after_stop_fail_except_stop() {
        let temp_dir = TempDir::new().unwrap();
        let mut listener = listener(&temp_dir);
        listener.start().unwrap();
        listener.stop().await.unwrap();

        assert!(matches!(listener.pause(), Err(Error::AlreadyStopped)));
        assert!(matches!(listener.unpause(), Err(Error::AlreadyStopped)));
        assert!(matches!(
            listener.ignore(["*.log"]),
            Err(Error::AlreadyStopped)
        ));
        assert!(matches!(listener.start(), Err(Error::AlreadyStopped)));
        assert!(matches!(
            listener.on_change(|_, _, _| {}),
            Err(Error::AlreadyStopped)
        ));

        // Repeated stop is tolerated.
        listener.stop().await.unwrap();
        assert_eq!(listener.state(), State::Stopped);
    }

    #[tokio::test]
    async fn test_pause_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut listener = listener(&temp_dir);
        listener.start().unwrap();

        listener.pause().unwrap();
        listener.pause().unwrap();
        assert!(listener.is_paused());

        listener.unpause().unwrap();
        listener.unpause().unwrap();
        assert!(listener.is_listening());

        listener.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unpause_rebuilds_record_once() {
        let temp_dir = TempDir::new().unwrap();
        let builds = Arc::new(AtomicUsize::new(0));
        let mut listener = listener(&temp_dir).with_record(Box::new(CountingRecord {
            builds: Arc::clone(&builds),
        }));

        listener.start().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1); // initial baseline

        listener.pause().unwrap();
        listener.unpause().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2); // exactly one rebuild
        assert!(listener.is_listening());

        listener.stop().await.unwrap();
    }

    #[test]
    fn test_callback_registered_once() {
        let temp_dir = TempDir::new().unwrap();
        let listener = listener(&temp_dir);
        listener.on_change(|_, _, _| {}).unwrap();
        assert!(matches!(
            listener.on_change(|_, _, _| {}),
            Err(Error::CallbackAlreadyRegistered)
        ));
    }
}
