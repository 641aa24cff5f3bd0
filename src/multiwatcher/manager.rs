//! Single-actor orchestrator between the backing and the watchers.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use super::Backing;
use super::Change;
use super::Store;
use super::Watcher;
use crate::BackingError;
use crate::Delta;
use crate::Error;
use crate::Result;

/// A pending `next()` call from one watcher. A request without a reply
/// channel is a stop request for that watcher.
pub(crate) struct Request {
    pub(crate) watcher_id: u64,
    pub(crate) reply: Option<oneshot::Sender<Result<Vec<Delta>>>>,
}

/// State shared between the manager task and the watcher handles.
pub(crate) struct ManagerShared {
    pub(crate) request_tx: mpsc::UnboundedSender<Request>,

    /// Set once, before the manager task exits on a backing failure.
    terminal: RwLock<Option<BackingError>>,
}

impl ManagerShared {
    /// The error a watcher should surface when the manager is gone or has
    /// refused a request.
    pub(crate) fn terminal_error(&self) -> Error {
        match &*self.terminal.read() {
            Some(err) => Error::Backing(err.clone()),
            None => Error::WatcherStopped,
        }
    }
}

/// Owns one [`Store`] and one [`Backing`] and mediates between the backing's
/// change feed and any number of watchers.
///
/// All engine state lives inside a single spawned task; `StoreManager` is
/// the external handle used to create watchers and to shut the engine down.
/// Must be created inside a tokio runtime.
pub struct StoreManager {
    shared: Arc<ManagerShared>,
    shutdown_tx: watch::Sender<()>,
    run_handle: Mutex<Option<JoinHandle<std::result::Result<(), BackingError>>>>,
    next_watcher_id: AtomicU64,
}

impl StoreManager {
    /// Spawns the manager task: seed the store from the backing, subscribe
    /// to its change feed, then serve watcher requests until stopped.
    pub fn new<B: Backing>(backing: B) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let shared = Arc::new(ManagerShared {
            request_tx,
            terminal: RwLock::new(None),
        });
        let core = ManagerCore::new(backing);
        let run_handle = tokio::spawn(run_loop(core, shared.clone(), request_rx, shutdown_rx));
        StoreManager {
            shared,
            shutdown_tx,
            run_handle: Mutex::new(Some(run_handle)),
            next_watcher_id: AtomicU64::new(1),
        }
    }

    /// Creates a new observer of the store. Its first `next()` returns the
    /// store's current contents.
    pub fn watch(&self) -> Watcher {
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        Watcher::new(id, self.shared.clone())
    }

    /// Shuts the engine down and returns its terminal error: `Ok` after a
    /// clean stop, or the backing error that killed the manager. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        let handle = self.run_handle.lock().take();
        match handle {
            Some(handle) => match handle.await? {
                Ok(()) => Ok(()),
                Err(err) => Err(Error::Backing(err)),
            },
            None => match &*self.shared.terminal.read() {
                Some(err) => Err(Error::Backing(err.clone())),
                None => Ok(()),
            },
        }
    }
}

async fn run_loop<B: Backing>(
    mut core: ManagerCore<B>,
    shared: Arc<ManagerShared>,
    mut request_rx: mpsc::UnboundedReceiver<Request>,
    mut shutdown_rx: watch::Receiver<()>,
) -> std::result::Result<(), BackingError> {
    let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
    let result = core
        .event_loop(changes_tx, &mut changes_rx, &mut request_rx, &mut shutdown_rx)
        .await;
    core.backing.unwatch();
    if let Err(err) = &result {
        error!(%err, "store manager terminating on backing error");
        *shared.terminal.write() = Some(err.clone());
    }
    core.fail_waiters(result.as_ref().err());
    result
}

/// The manager's single-threaded state: everything in here is touched only
/// from the manager task (or, in unit tests, directly).
pub(crate) struct ManagerCore<B: Backing> {
    pub(crate) all: Store,
    pub(crate) backing: B,

    /// Pending requests per watcher, newest first. When a watcher has
    /// several `next()` calls outstanding only the newest needs serving
    /// first; older ones pick up residual deltas on later store changes.
    pub(crate) waiting: HashMap<u64, VecDeque<Request>>,

    /// Largest revno each known watcher has been told about.
    pub(crate) watchers: HashMap<u64, i64>,

    /// Watchers that have been stopped; their requests are refused.
    pub(crate) stopped: HashSet<u64>,
}

impl<B: Backing> ManagerCore<B> {
    pub(crate) fn new(backing: B) -> Self {
        ManagerCore {
            all: Store::new(),
            backing,
            waiting: HashMap::new(),
            watchers: HashMap::new(),
            stopped: HashSet::new(),
        }
    }

    async fn event_loop(
        &mut self,
        changes_tx: mpsc::UnboundedSender<Change>,
        changes_rx: &mut mpsc::UnboundedReceiver<Change>,
        request_rx: &mut mpsc::UnboundedReceiver<Request>,
        shutdown_rx: &mut watch::Receiver<()>,
    ) -> std::result::Result<(), BackingError> {
        self.backing.get_all(&mut self.all).await?;
        self.backing.watch(changes_tx);
        info!("store manager running");
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    debug!("store manager received shutdown signal");
                    return Ok(());
                }

                Some(request) = request_rx.recv() => {
                    trace!(watcher_id = request.watcher_id, "received watcher request");
                    self.handle(request);
                }

                Some(change) = changes_rx.recv() => {
                    trace!(kind = %change.kind, id = %change.id, "received backing change");
                    self.backing.changed(&mut self.all, change).await?;
                }
            }
            self.respond();
        }
    }

    /// Processes one watcher request: queue a `next()`, or carry out a stop.
    pub(crate) fn handle(
        &mut self,
        mut request: Request,
    ) {
        if self.stopped.contains(&request.watcher_id) {
            if let Some(reply) = request.reply.take() {
                let _ = reply.send(Err(Error::WatcherStopped));
            }
            return;
        }
        if request.reply.is_none() {
            self.stop_watcher(request.watcher_id);
            return;
        }
        self.waiting
            .entry(request.watcher_id)
            .or_default()
            .push_front(request);
    }

    fn stop_watcher(
        &mut self,
        watcher_id: u64,
    ) {
        debug!(watcher_id, "stopping watcher");
        if let Some(mut requests) = self.waiting.remove(&watcher_id) {
            for request in requests.drain(..) {
                if let Some(reply) = request.reply {
                    let _ = reply.send(Err(Error::WatcherStopped));
                }
            }
        }
        self.stopped.insert(watcher_id);
        let seen_revno = self.watchers.remove(&watcher_id).unwrap_or(0);
        self.all.forget_observer(seen_revno);
    }

    /// Serves every watcher whose newest pending request can be satisfied,
    /// i.e. the store has revisions the watcher has not seen. Watchers with
    /// no pending request or no new revisions are left untouched.
    pub(crate) fn respond(&mut self) {
        let watcher_ids: Vec<u64> = self.waiting.keys().copied().collect();
        for watcher_id in watcher_ids {
            let revno = *self.watchers.entry(watcher_id).or_insert(0);
            let changes = self.all.changes_since(revno);
            if changes.is_empty() {
                continue;
            }
            self.adjust_refs(revno, &changes);
            let queue = self
                .waiting
                .get_mut(&watcher_id)
                .expect("waiting entry vanished");
            let request = queue.pop_front().expect("empty waiting queue");
            if queue.is_empty() {
                self.waiting.remove(&watcher_id);
            }
            self.watchers.insert(watcher_id, self.all.latest_revno());
            if let Some(reply) = request.reply {
                let _ = reply.send(Ok(changes));
            }
        }
    }

    /// Reference-count bookkeeping for a batch of deltas about to be
    /// delivered to a watcher that last saw `revno`: a first sighting of a
    /// live entity takes a reference, a removal releases the one the
    /// watcher held. Tombstones are garbage-collected by the final release.
    fn adjust_refs(
        &mut self,
        revno: i64,
        changes: &[Delta],
    ) {
        for delta in changes {
            let id = self.backing.id_for_info(&delta.entity);
            if delta.removed {
                self.all.dec_ref(&id);
            } else if self.all.creation_revno(&id).is_some_and(|c| c > revno) {
                self.all.inc_ref(&id);
            }
        }
    }

    /// Refuses every pending request, with the backing's terminal error if
    /// there is one.
    fn fail_waiters(
        &mut self,
        terminal: Option<&BackingError>,
    ) {
        for (_, mut requests) in self.waiting.drain() {
            for request in requests.drain(..) {
                if let Some(reply) = request.reply {
                    let err = match terminal {
                        Some(err) => Error::Backing(err.clone()),
                        None => Error::WatcherStopped,
                    };
                    let _ = reply.send(Err(err));
                }
            }
        }
    }
}
