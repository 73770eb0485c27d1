//! Error taxonomy for the listener

use thiserror::Error;

/// Errors surfaced by the listener control surface.
///
/// Lifecycle misuse (`AlreadyStarted`, `AlreadyStopped`, `NotStarted`) is
/// reported synchronously from the operation that violated the state
/// machine. Callback panics are caught inside the aggregation loop and
/// logged; they never surface here and never halt future deliveries.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad directories or options, surfaced at construction or `start`.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `start` called on a listener that is already running or paused.
    #[error("listener already started")]
    AlreadyStarted,

    /// Operation attempted after `stop` (repeated `stop` is tolerated).
    #[error("listener already stopped")]
    AlreadyStopped,

    /// Operation attempted before `start`.
    #[error("listener not started")]
    NotStarted,

    /// `on_change` called when a callback is already registered.
    #[error("change callback already registered")]
    CallbackAlreadyRegistered,

    /// The raw event source could not initialize and no fallback applied.
    #[error("watch source failed to initialize")]
    WatchSource(#[source] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
