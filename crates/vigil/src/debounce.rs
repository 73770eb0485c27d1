//! Debounce aggregation loop
//!
//! Single consumer task between the raw event sources and the registered
//! callback. Drains the shared buffer without blocking, waits out a quiet
//! window after the last arrival, then coalesces the batch and delivers
//! the net change set. Runs only while the listener is `Running`; paused
//! batches are discarded and a stop request is observed within one tick.

use crate::coalesce;
use crate::event::{FsProbe, NetChangeSet, RawChange};
use crate::listener::{Shared, State};
use crossbeam_channel::{Receiver, TryRecvError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

/// Polling increment between buffer drains. Also bounds how long a stop
/// request can go unobserved.
pub(crate) const TICK: Duration = Duration::from_millis(10);

pub(crate) struct DebounceLoop {
    rx: Receiver<RawChange>,
    shared: Arc<Shared>,
}

impl DebounceLoop {
    pub(crate) fn new(rx: Receiver<RawChange>, shared: Arc<Shared>) -> Self {
        Self { rx, shared }
    }

    pub(crate) async fn run(self) {
        let wait = self.shared.config.wait_for_delay;
        let mut pending: Vec<RawChange> = Vec::new();
        let mut deadline: Option<Instant> = None;

        loop {
            match self.shared.state() {
                State::Stopping | State::Stopped => {
                    // No flush of a partial batch on stop.
                    if !pending.is_empty() {
                        debug!("Dropping {} undelivered raw changes on stop", pending.len());
                    }
                    break;
                }
                State::Paused => {
                    let discarded = pending.len() + self.rx.try_iter().count();
                    if discarded > 0 {
                        debug!("Discarding {} raw changes while paused", discarded);
                        pending.clear();
                    }
                    deadline = None;
                }
                State::Created | State::Running => {
                    let mut arrived = false;
                    loop {
                        match self.rx.try_recv() {
                            Ok(change) => {
                                if self.shared.config.debug {
                                    debug!("Buffered raw change: {:?}", change);
                                }
                                pending.push(change);
                                arrived = true;
                            }
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                // Every producer is gone while we are still
                                // supposed to be running; nothing can ever
                                // arrive again.
                                error!("Raw event source disconnected; stopping listener");
                                self.shared.set_state(State::Stopped);
                                return;
                            }
                        }
                    }

                    if arrived {
                        deadline = Some(Instant::now() + wait);
                    }

                    if let Some(at) = deadline {
                        if Instant::now() >= at {
                            if !pending.is_empty() {
                                self.flush(&mut pending);
                            }
                            deadline = None;
                        }
                    }
                }
            }

            tokio::time::sleep(TICK).await;
        }
    }

    /// Coalesce the pending batch and deliver it, if anything survives.
    ///
    /// One filter snapshot covers the whole batch, so every path in it is
    /// judged by the same rule set. The callback runs synchronously here:
    /// at most one delivery is in flight, and a panicking callback is
    /// caught and logged without stopping the loop.
    fn flush(&self, pending: &mut Vec<RawChange>) {
        let batch = std::mem::take(pending);
        let filter = self.shared.filter();
        let set = coalesce::reduce(&batch, &filter, &FsProbe);

        if set.is_empty() {
            trace!("Batch of {} raw changes coalesced to nothing", batch.len());
            return;
        }

        let Some(callback) = self.shared.callback() else {
            warn!(
                "Coalesced {} changes but no callback is registered; dropping",
                set.len()
            );
            return;
        };

        debug!(
            "Delivering {} net changes (from {} raw events)",
            set.len(),
            batch.len()
        );
        let NetChangeSet {
            modified,
            added,
            removed,
        } = set;
        if catch_unwind(AssertUnwindSafe(|| callback(modified, added, removed))).is_err() {
            error!("Change callback panicked; future deliveries continue");
        }
    }
}
