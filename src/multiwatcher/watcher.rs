//! Observer handle over the store's delta stream.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::oneshot;
use tracing::trace;

use super::manager::ManagerShared;
use super::manager::Request;
use crate::Delta;
use crate::Error;
use crate::Result;

/// A client's view onto the store, created with
/// [`StoreManager::watch`](super::StoreManager::watch).
///
/// Each call to [`next`](Watcher::next) returns the batch of deltas since
/// the watcher's own last call, blocking until there is something new.
/// Several `next` calls may be outstanding at once; the manager serves the
/// newest first and older calls pick up later changes.
pub struct Watcher {
    id: u64,
    shared: Arc<ManagerShared>,
    stopped: AtomicBool,
}

impl Watcher {
    pub(crate) fn new(
        id: u64,
        shared: Arc<ManagerShared>,
    ) -> Self {
        Watcher {
            id,
            shared,
            stopped: AtomicBool::new(false),
        }
    }

    /// Waits for the next batch of deltas since this watcher's last call,
    /// ordered by ascending revision.
    ///
    /// Fails with [`Error::WatcherStopped`] once the watcher or the manager
    /// has been stopped, or with the manager's terminal error if the backing
    /// failed.
    pub async fn next(&self) -> Result<Vec<Delta>> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err(Error::WatcherStopped);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = Request {
            watcher_id: self.id,
            reply: Some(reply_tx),
        };
        if self.shared.request_tx.send(request).is_err() {
            return Err(self.shared.terminal_error());
        }
        match reply_rx.await {
            Ok(result) => result,
            // The manager dropped the reply without answering; it is gone.
            Err(_) => Err(self.shared.terminal_error()),
        }
    }

    /// Stops the watcher. Pending and future `next` calls fail with
    /// [`Error::WatcherStopped`]. Idempotent.
    pub fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        trace!(watcher_id = self.id, "watcher stop requested");
        let _ = self.shared.request_tx.send(Request {
            watcher_id: self.id,
            reply: None,
        });
        Ok(())
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if !self.stopped.load(Ordering::Relaxed) {
            let _ = self.shared.request_tx.send(Request {
                watcher_id: self.id,
                reply: None,
            });
        }
    }
}
