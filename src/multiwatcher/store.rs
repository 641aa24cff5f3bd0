//! Revision-ordered mirror of the backing store.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Bound;

use crate::Delta;
use crate::EntityId;
use crate::EntityInfo;

/// One tracked entity inside the [`Store`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoreEntry {
    /// Last known state; kept even when removed so the tombstone can be
    /// delivered with the entity's final attributes.
    pub(crate) info: EntityInfo,

    /// Revision at which the entity was first inserted. Never changes.
    pub(crate) creation_revno: i64,

    /// Revision of the last mutation (insert, update or mark-removed).
    pub(crate) revno: i64,

    /// Number of live watchers that saw this entity alive and have not yet
    /// been told it is gone.
    pub(crate) ref_count: usize,

    /// Once true, the entry is a tombstone awaiting drainage.
    pub(crate) removed: bool,
}

/// In-memory mirror of the backing store's entities, versioned by a
/// monotonic revision number.
///
/// Entries are kept in a changelog ordered by their current revno. An update
/// moves the entity's single entry to the tail of that order, so one suffix
/// walk serves inserts, updates and removals in total order while each
/// entity appears at most once. Tombstones stay in the changelog at their
/// removal revno until every watcher that saw the entity alive has been
/// notified.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) entities: HashMap<EntityId, StoreEntry>,
    pub(crate) changelog: BTreeMap<i64, EntityId>,
    pub(crate) latest_revno: i64,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// The revision of the most recent structural change, or 0 when no
    /// change has ever been recorded.
    pub fn latest_revno(&self) -> i64 {
        self.latest_revno
    }

    /// Updates the information for the given entity. `None` marks the entity
    /// removed; an unknown id with `None` is ignored, as is a removal of an
    /// entry already marked removed.
    pub fn update(
        &mut self,
        id: &EntityId,
        info: Option<EntityInfo>,
    ) {
        let Some(info) = info else {
            self.mark_removed(id);
            return;
        };
        if !self.entities.contains_key(id) {
            self.add(id.clone(), info);
            return;
        }
        let entry = self.entities.get_mut(id).expect("entry just checked");
        // Re-sending identical info still counts as a change: the revno is
        // bumped and the entry moves to the tail of the changelog.
        self.changelog.remove(&entry.revno);
        self.latest_revno += 1;
        entry.revno = self.latest_revno;
        entry.info = info;
        self.changelog.insert(entry.revno, id.clone());
    }

    fn add(
        &mut self,
        id: EntityId,
        info: EntityInfo,
    ) {
        self.latest_revno += 1;
        let revno = self.latest_revno;
        self.entities.insert(
            id.clone(),
            StoreEntry {
                info,
                creation_revno: revno,
                revno,
                ref_count: 0,
                removed: false,
            },
        );
        self.changelog.insert(revno, id);
    }

    fn mark_removed(
        &mut self,
        id: &EntityId,
    ) {
        let Some(entry) = self.entities.get_mut(id) else {
            return;
        };
        if entry.removed {
            return;
        }
        self.latest_revno += 1;
        if entry.ref_count == 0 {
            // Added and removed without any watcher caring.
            self.delete(id);
            return;
        }
        self.changelog.remove(&entry.revno);
        entry.revno = self.latest_revno;
        entry.removed = true;
        self.changelog.insert(entry.revno, id.clone());
    }

    /// Returns a delta for every entry changed after `revno`, in ascending
    /// revno order. Tombstones of entities created after `revno` are
    /// suppressed: a watcher that never saw an entity alive is not told of
    /// its removal. A negative `revno` returns everything.
    pub fn changes_since(
        &self,
        revno: i64,
    ) -> Vec<Delta> {
        let mut changes = Vec::new();
        for id in self
            .changelog
            .range((Bound::Excluded(revno), Bound::Unbounded))
            .map(|(_, id)| id)
        {
            let entry = &self.entities[id];
            if entry.removed && entry.creation_revno > revno {
                continue;
            }
            changes.push(Delta {
                removed: entry.removed,
                entity: entry.info.clone(),
            });
        }
        changes
    }

    /// Records that one more watcher has observed the entity alive.
    pub(crate) fn inc_ref(
        &mut self,
        id: &EntityId,
    ) {
        let entry = self
            .entities
            .get_mut(id)
            .expect("incremented entry is missing");
        entry.ref_count += 1;
    }

    /// Records that a watcher no longer needs the entry, deleting it once it
    /// is an unreferenced tombstone.
    pub(crate) fn dec_ref(
        &mut self,
        id: &EntityId,
    ) {
        let entry = self
            .entities
            .get_mut(id)
            .expect("decremented entry is missing");
        assert!(entry.ref_count > 0, "negative reference count");
        entry.ref_count -= 1;
        if entry.ref_count == 0 && entry.removed {
            self.delete(id);
        }
    }

    pub(crate) fn creation_revno(
        &self,
        id: &EntityId,
    ) -> Option<i64> {
        self.entities.get(id).map(|e| e.creation_revno)
    }

    /// Releases the references held on behalf of a watcher that last saw
    /// revision `seen_revno`: every entry the watcher observed alive and was
    /// never told is gone.
    pub(crate) fn forget_observer(
        &mut self,
        seen_revno: i64,
    ) {
        let seen: Vec<EntityId> = self
            .changelog
            .values()
            .filter(|id| {
                let entry = &self.entities[*id];
                entry.creation_revno <= seen_revno && (!entry.removed || entry.revno > seen_revno)
            })
            .cloned()
            .collect();
        for id in &seen {
            self.dec_ref(id);
        }
    }

    /// Removes the entry from both the changelog and the entity map without
    /// assigning a new revision.
    fn delete(
        &mut self,
        id: &EntityId,
    ) {
        if let Some(entry) = self.entities.remove(id) {
            self.changelog.remove(&entry.revno);
        }
    }

    #[cfg(test)]
    pub(crate) fn delete_for_test(
        &mut self,
        id: &EntityId,
    ) {
        self.delete(id);
    }
}
