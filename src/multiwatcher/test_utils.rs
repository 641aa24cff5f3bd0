//! Shared scaffolding for the engine's unit tests: an in-memory backing and
//! store-contents assertions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::Backing;
use super::Change;
use super::Store;
use crate::BackingError;
use crate::EntityId;
use crate::EntityInfo;
use crate::MachineInfo;
use crate::ServiceInfo;

pub(crate) fn machine(id: &str) -> EntityInfo {
    EntityInfo::Machine(MachineInfo {
        id: id.to_string(),
        instance_id: None,
    })
}

pub(crate) fn machine_with_instance(
    id: &str,
    instance_id: &str,
) -> EntityInfo {
    EntityInfo::Machine(MachineInfo {
        id: id.to_string(),
        instance_id: Some(instance_id.to_string()),
    })
}

pub(crate) fn service(
    name: &str,
    exposed: bool,
) -> EntityInfo {
    EntityInfo::Service(ServiceInfo {
        name: name.to_string(),
        exposed,
        charm_url: None,
        constraints: None,
    })
}

/// Expected shape of one store entry, listed in ascending revno order.
pub(crate) struct ExpectedEntry {
    pub(crate) creation_revno: i64,
    pub(crate) revno: i64,
    pub(crate) ref_count: usize,
    pub(crate) removed: bool,
    pub(crate) info: EntityInfo,
}

pub(crate) fn assert_store_contents(
    all: &Store,
    latest_revno: i64,
    expect: &[ExpectedEntry],
) {
    assert_eq!(all.changelog.len(), expect.len(), "changelog length");
    assert_eq!(all.entities.len(), expect.len(), "entity map length");
    for ((revno, id), want) in all.changelog.iter().zip(expect) {
        let entry = &all.entities[id];
        assert_eq!(*revno, want.revno, "changelog key for {id}");
        assert_eq!(entry.revno, want.revno, "revno of {id}");
        assert_eq!(
            entry.creation_revno, want.creation_revno,
            "creation revno of {id}"
        );
        assert_eq!(entry.ref_count, want.ref_count, "ref count of {id}");
        assert_eq!(entry.removed, want.removed, "removed mark of {id}");
        assert_eq!(entry.info, want.info, "info of {id}");
        assert_eq!(*id, want.info.entity_id(), "entity map key");
    }
    assert_eq!(all.latest_revno(), latest_revno, "latest revno");
}

#[derive(Default)]
struct TestBackingState {
    entities: HashMap<EntityId, EntityInfo>,
    fetch_err: Option<String>,
    events: Option<mpsc::UnboundedSender<Change>>,
}

/// In-memory backing: a map of entities plus a registered change feed.
/// Cloning shares the state so tests can mutate entities after handing the
/// backing to a manager.
#[derive(Clone)]
pub(crate) struct TestBacking {
    state: Arc<Mutex<TestBackingState>>,
}

impl TestBacking {
    pub(crate) fn new(initial: Vec<EntityInfo>) -> Self {
        let mut entities = HashMap::new();
        for info in initial {
            entities.insert(info.entity_id(), info);
        }
        TestBacking {
            state: Arc::new(Mutex::new(TestBackingState {
                entities,
                ..TestBackingState::default()
            })),
        }
    }

    pub(crate) fn update_entity(
        &self,
        info: EntityInfo,
    ) {
        let mut state = self.state.lock();
        let id = info.entity_id();
        state.entities.insert(id.clone(), info);
        if let Some(events) = &state.events {
            let _ = events.send(Change {
                kind: id.kind,
                id: id.id,
            });
        }
    }

    pub(crate) fn delete_entity(
        &self,
        id: EntityId,
    ) {
        let mut state = self.state.lock();
        state.entities.remove(&id);
        if let Some(events) = &state.events {
            let _ = events.send(Change {
                kind: id.kind,
                id: id.id,
            });
        }
    }

    pub(crate) fn set_fetch_error(
        &self,
        message: &str,
    ) {
        self.state.lock().fetch_err = Some(message.to_string());
    }
}

#[async_trait]
impl Backing for TestBacking {
    async fn get_all(
        &self,
        all: &mut Store,
    ) -> Result<(), BackingError> {
        let state = self.state.lock();
        if let Some(message) = &state.fetch_err {
            return Err(BackingError(message.clone()));
        }
        for (id, info) in &state.entities {
            all.update(id, Some(info.clone()));
        }
        Ok(())
    }

    async fn changed(
        &self,
        all: &mut Store,
        change: Change,
    ) -> Result<(), BackingError> {
        let id = EntityId::new(change.kind, change.id);
        let fetched = {
            let state = self.state.lock();
            if let Some(message) = &state.fetch_err {
                return Err(BackingError(message.clone()));
            }
            state.entities.get(&id).cloned()
        };
        all.update(&id, fetched);
        Ok(())
    }

    fn watch(
        &self,
        events: mpsc::UnboundedSender<Change>,
    ) {
        let mut state = self.state.lock();
        assert!(state.events.is_none(), "test backing can only watch once");
        state.events = Some(events);
    }

    fn unwatch(&self) {
        self.state.lock().events = None;
    }
}
