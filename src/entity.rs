//! Entity identities and info documents.
//!
//! The watch engine treats entity state as opaque: it stores an
//! [`EntityInfo`], compares it for equality, and projects its [`EntityId`].
//! The concrete kinds below mirror the orchestrator's document model.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::Constraints;

/// The kinds of entity tracked by the state layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Machine,
    Service,
    Unit,
    Charm,
    Relation,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Machine => "machine",
            EntityKind::Service => "service",
            EntityKind::Unit => "unit",
            EntityKind::Charm => "charm",
            EntityKind::Relation => "relation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique handle for an entity across all kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityId {
    pub fn new(
        kind: EntityKind,
        id: impl Into<String>,
    ) -> Self {
        EntityId {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Current known attributes of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// Current known attributes of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charm_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

/// Current known attributes of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub name: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_address: Option<String>,
}

/// Current known attributes of a charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmInfo {
    pub url: String,
}

/// Current known attributes of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInfo {
    pub key: String,
}

/// Tagged variant over every entity kind's info document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntityInfo {
    Machine(MachineInfo),
    Service(ServiceInfo),
    Unit(UnitInfo),
    Charm(CharmInfo),
    Relation(RelationInfo),
}

impl EntityInfo {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityInfo::Machine(_) => EntityKind::Machine,
            EntityInfo::Service(_) => EntityKind::Service,
            EntityInfo::Unit(_) => EntityKind::Unit,
            EntityInfo::Charm(_) => EntityKind::Charm,
            EntityInfo::Relation(_) => EntityKind::Relation,
        }
    }

    /// Projects the identity this info document describes.
    pub fn entity_id(&self) -> EntityId {
        let id = match self {
            EntityInfo::Machine(m) => &m.id,
            EntityInfo::Service(s) => &s.name,
            EntityInfo::Unit(u) => &u.name,
            EntityInfo::Charm(c) => &c.url,
            EntityInfo::Relation(r) => &r.key,
        };
        EntityId::new(self.kind(), id.clone())
    }
}

/// A single observation delivered to a watcher.
///
/// `removed` distinguishes a tombstone notification from an insert or
/// update; for removals, `entity` carries the last known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub removed: bool,
    pub entity: EntityInfo,
}
