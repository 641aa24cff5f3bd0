//! Shared fixtures for integration tests: an in-memory backing over the
//! public engine API.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use fleetstate::BackingError;
use fleetstate::Delta;
use fleetstate::EntityId;
use fleetstate::EntityInfo;
use fleetstate::MachineInfo;
use fleetstate::ServiceInfo;
use fleetstate::multiwatcher::Backing;
use fleetstate::multiwatcher::Change;
use fleetstate::multiwatcher::Store;
use fleetstate::multiwatcher::Watcher;

pub fn machine(id: &str) -> EntityInfo {
    EntityInfo::Machine(MachineInfo {
        id: id.to_string(),
        instance_id: None,
    })
}

pub fn machine_with_instance(
    id: &str,
    instance_id: &str,
) -> EntityInfo {
    EntityInfo::Machine(MachineInfo {
        id: id.to_string(),
        instance_id: Some(instance_id.to_string()),
    })
}

#[allow(dead_code)]
pub fn service(
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

#[derive(Default)]
struct TestBackingState {
    entities: HashMap<EntityId, EntityInfo>,
    events: Option<mpsc::UnboundedSender<Change>>,
}

/// In-memory backing; clones share state so tests can mutate entities after
/// handing the backing to a manager.
#[derive(Clone, Default)]
pub struct TestBacking {
    state: Arc<Mutex<TestBackingState>>,
}

impl TestBacking {
    pub fn new(initial: Vec<EntityInfo>) -> Self {
        let backing = TestBacking::default();
        {
            let mut state = backing.state.lock().unwrap();
            for info in initial {
                state.entities.insert(info.entity_id(), info);
            }
        }
        backing
    }

    pub fn update_entity(
        &self,
        info: EntityInfo,
    ) {
        let mut state = self.state.lock().unwrap();
        let id = info.entity_id();
        state.entities.insert(id.clone(), info);
        if let Some(events) = &state.events {
            let _ = events.send(Change {
                kind: id.kind,
                id: id.id,
            });
        }
    }

    pub fn delete_entity(
        &self,
        id: EntityId,
    ) {
        let mut state = self.state.lock().unwrap();
        state.entities.remove(&id);
        if let Some(events) = &state.events {
            let _ = events.send(Change {
                kind: id.kind,
                id: id.id,
            });
        }
    }
}

#[async_trait]
impl Backing for TestBacking {
    async fn get_all(
        &self,
        all: &mut Store,
    ) -> Result<(), BackingError> {
        let state = self.state.lock().unwrap();
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
        let fetched = self.state.lock().unwrap().entities.get(&id).cloned();
        all.update(&id, fetched);
        Ok(())
    }

    fn watch(
        &self,
        events: mpsc::UnboundedSender<Change>,
    ) {
        self.state.lock().unwrap().events = Some(events);
    }

    fn unwatch(&self) {
        self.state.lock().unwrap().events = None;
    }
}

/// Batches are compared as sets: the seeding order is arbitrary and a
/// removed delta's info content is not significant.
pub fn delta_map(deltas: &[Delta]) -> HashMap<EntityId, Option<EntityInfo>> {
    let mut m = HashMap::new();
    for delta in deltas {
        let id = delta.entity.entity_id();
        let value = if delta.removed {
            None
        } else {
            Some(delta.entity.clone())
        };
        assert!(
            m.insert(id.clone(), value).is_none(),
            "{id} mentioned twice in delta set"
        );
    }
    m
}

pub async fn check_next(
    w: &Watcher,
    want: Vec<Delta>,
) {
    let got = timeout(Duration::from_secs(1), w.next())
        .await
        .expect("no change received in sufficient time")
        .expect("next failed");
    assert_eq!(delta_map(&got), delta_map(&want));
}

pub fn changed(entity: EntityInfo) -> Delta {
    Delta {
        removed: false,
        entity,
    }
}

pub fn removed(entity: EntityInfo) -> Delta {
    Delta {
        removed: true,
        entity,
    }
}
