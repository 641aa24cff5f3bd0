//! Multi-watcher fan-out engine.
//!
//! An in-memory, revision-versioned mirror of the backing store's change
//! stream that serves any number of independent observers a consistent,
//! gap-free stream of entity deltas without re-scanning the backing store on
//! their behalf.
//!
//! Architecture: Single-Actor Manager + Revision-Ordered Store
//!
//! ```text
//! Backing (remote change feed):
//!   watch() -> mpsc::send(Change)
//!                    ↓
//! StoreManager (single tokio task):
//!   select! { changes, requests, shutdown } -> Store::update -> respond()
//!                    ↓
//! Watchers:
//!   next() -> oneshot::Receiver<Result<Vec<Delta>>>
//! ```
//!
//! Every state transition happens inside the manager task, so the engine
//! needs no locking. A watcher's `next()` becomes a request message; the
//! manager replies once the store holds revisions the watcher has not seen.
//! Removed entities stay visible as tombstones exactly until every watcher
//! that saw them alive has been told of the removal once, then they are
//! garbage-collected via reference counts.

mod manager;
mod store;
mod watcher;

#[cfg(test)]
mod test_utils;

pub use manager::StoreManager;
pub use store::Store;
pub use watcher::Watcher;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::BackingError;
use crate::EntityId;
use crate::EntityInfo;
use crate::EntityKind;

/// A store-level change event emitted by a backing: "the document for this
/// entity changed". The new state is not carried; the engine fetches it via
/// [`Backing::changed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: EntityKind,
    pub id: String,
}

/// Data-source collaborator that authoritatively emits per-entity changes.
///
/// The engine is the sole caller of `get_all` and `changed`, always from the
/// manager task; implementations only need to serialize against their own
/// notification threads.
#[async_trait]
pub trait Backing: Send + Sync + 'static {
    /// Seeds the store with every currently-existing entity.
    async fn get_all(
        &self,
        all: &mut Store,
    ) -> Result<(), BackingError>;

    /// Applies one store-level change: fetch the entity and update the
    /// store, translating "not found" into a removal rather than an error.
    async fn changed(
        &self,
        all: &mut Store,
        change: Change,
    ) -> Result<(), BackingError>;

    /// Subscribes the engine to the raw change feed. Every subsequent
    /// store-level change must be delivered at least once on `events`.
    fn watch(
        &self,
        events: mpsc::UnboundedSender<Change>,
    );

    /// Cancels the subscription; no further sends may occur afterwards.
    fn unwatch(&self);

    /// Projects the identity of an info document.
    fn id_for_info(
        &self,
        info: &EntityInfo,
    ) -> EntityId {
        info.entity_id()
    }
}
