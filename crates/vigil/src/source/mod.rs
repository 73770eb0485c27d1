//! Raw event sources
//!
//! Producers push `RawChange` records into the shared buffer consumed by
//! the aggregation loop. Two strategies ship with the crate: the native
//! notify backend and a walkdir polling fallback. Both sit behind the
//! `EventSource` trait so tests (and embedders) can substitute their own.

mod backend;
mod polling;

pub use backend::NotifySource;
pub use polling::PollingSource;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::RawChange;
use crossbeam_channel::Sender;
use std::path::Path;
use tracing::warn;

/// Capability interface for raw event producers.
pub trait EventSource: Send {
    /// Begin pushing records into `queue`. Must not block the caller.
    fn start(&mut self, queue: Sender<RawChange>) -> Result<()>;

    /// Halt production. Idempotent.
    fn stop(&mut self);
}

/// Pick and start a backend for the watched directories.
///
/// Native watching is preferred. If it cannot initialize (OS watch limits
/// and the like) the listener falls back to polling, surfacing the
/// configured fallback message once. When polling was forced there is no
/// further fallback and its failure is fatal.
pub(crate) fn start_source(
    dirs: &[impl AsRef<Path>],
    config: &Config,
    queue: Sender<RawChange>,
) -> Result<Box<dyn EventSource>> {
    let dirs: Vec<_> = dirs.iter().map(|d| d.as_ref().to_path_buf()).collect();

    if config.force_polling {
        let mut source = PollingSource::new(dirs, config.poll_interval());
        source.start(queue)?;
        return Ok(Box::new(source));
    }

    let mut native = NotifySource::new(dirs.clone());
    match native.start(queue.clone()) {
        Ok(()) => Ok(Box::new(native)),
        Err(Error::WatchSource(e)) => {
            match &config.polling_fallback_message {
                Some(message) => warn!("{message}"),
                None => warn!("Native file watching unavailable ({e}); falling back to polling"),
            }
            let mut source = PollingSource::new(dirs, config.poll_interval());
            source.start(queue)?;
            Ok(Box::new(source))
        }
        Err(e) => Err(e),
    }
}
