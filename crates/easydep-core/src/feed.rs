//! Periodic poll loop handing newly observed releases to the supervisor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::supervisor::ReleaseSupervisor;
use crate::traits::ReleaseSource;

const INTERRUPT_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Drives `source.latest_release()` on a fixed interval, handing
/// anything new to `supervisor`. Swallows I/O errors (retries next
/// tick); stops promptly once `shutdown` flips true, even mid-sleep.
pub struct ReleaseFeed {
    source: Arc<dyn ReleaseSource>,
    supervisor: Arc<ReleaseSupervisor>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl ReleaseFeed {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        supervisor: Arc<ReleaseSupervisor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            supervisor,
            poll_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone-able flag callers can flip (e.g. from a SIGINT/SIGTERM
    /// handler) to stop `run` between ticks or slices of a sleep.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Runs until `shutdown_flag()` is set. Blocks the calling thread;
    /// callers that want a daemon loop should call this from its own
    /// thread or from `main` directly.
    pub fn run(&self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.source.latest_release() {
                Ok(Some(release)) => self.supervisor.enqueue(release),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "release feed poll failed, retrying next tick");
                }
            }

            self.sleep_in_slices(self.poll_interval);
        }
    }

    fn sleep_in_slices(&self, total: Duration) {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let slice = remaining.min(INTERRUPT_CHECK_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
    }
}
