//! Entity classification.
//!
//! Loose input (a JSON-like object coming from a host or a test fixture) is
//! classified exactly once into the tagged `Entity` union:
//!
//! - a *valid entity* is a non-null object with an `id` field;
//! - a *node* is a valid entity with neither a `source` nor a `target` field;
//! - a *link* is a valid entity whose `source` and `target` are both nodes
//!   (checked one level deep, no further).
//!
//! Everything downstream matches on `Entity` instead of re-inspecting shapes.

use crate::id::EntityId;
use crate::model::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Why a loose value could not be turned into an `Entity`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("entity is null, not an object, or has no `id` field")]
    MissingId,
    #[error("entity id must be a string or an integer, got `{0}`")]
    InvalidId(String),
    #[error("link `{0}` has a source or target that is not a valid node")]
    UnresolvedEndpoint(EntityId),
}

/// Discriminant shared by entities, bindings, and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Link,
}

/// Nodes and links have separate id spaces, so a lookup needs both parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityKey {
    pub fn node(id: impl Into<EntityId>) -> Self {
        Self {
            kind: EntityKind::Node,
            id: id.into(),
        }
    }

    pub fn link(id: impl Into<EntityId>) -> Self {
        Self {
            kind: EntityKind::Link,
            id: id.into(),
        }
    }

    pub fn is_node(&self) -> bool {
        self.kind == EntityKind::Node
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Node => write!(f, "node {}", self.id),
            EntityKind::Link => write!(f, "link {}", self.id),
        }
    }
}

/// Node payload. Absent fields leave the stored node untouched on overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: EntityId,
    pub name: Option<String>,
    pub position: Option<Point>,
}

impl NodeSpec {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            position: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Point::new(x, y));
        self
    }
}

impl From<EntityId> for NodeSpec {
    fn from(id: EntityId) -> Self {
        Self::new(id)
    }
}

impl From<&str> for NodeSpec {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Link payload. Endpoints carry full node payloads so that adding a link
/// with fresh inline endpoints creates those nodes first.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub id: EntityId,
    pub name: Option<String>,
    pub source: NodeSpec,
    pub target: NodeSpec,
}

impl LinkSpec {
    pub fn new(
        id: impl Into<EntityId>,
        source: impl Into<NodeSpec>,
        target: impl Into<NodeSpec>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            source: source.into(),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A classified node or link.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(NodeSpec),
    Link(LinkSpec),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Node(n) => n.id,
            Entity::Link(l) => l.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Link(_) => EntityKind::Link,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            kind: self.kind(),
            id: self.id(),
        }
    }

    /// Classify a loose value. Never partially succeeds.
    pub fn from_value(value: &Value) -> Result<Self, EntityError> {
        let obj = valid_entity(value)?;
        if is_node_shape(obj) {
            return node_spec(obj).map(Entity::Node);
        }

        let id = parse_id(&obj["id"])?;
        let endpoint = |key: &str| {
            obj.get(key)
                .and_then(|v| valid_entity(v).ok())
                .filter(|o| is_node_shape(o))
                .ok_or(EntityError::UnresolvedEndpoint(id))
                .and_then(node_spec)
        };
        let source = endpoint("source")?;
        let target = endpoint("target")?;

        Ok(Entity::Link(LinkSpec {
            id,
            name: parse_name(obj),
            source,
            target,
        }))
    }
}

impl From<NodeSpec> for Entity {
    fn from(spec: NodeSpec) -> Self {
        Entity::Node(spec)
    }
}

impl From<LinkSpec> for Entity {
    fn from(spec: LinkSpec) -> Self {
        Entity::Link(spec)
    }
}

impl TryFrom<&Value> for Entity {
    type Error = EntityError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Entity::from_value(value)
    }
}

fn valid_entity(value: &Value) -> Result<&Map<String, Value>, EntityError> {
    value
        .as_object()
        .filter(|o| o.contains_key("id"))
        .ok_or(EntityError::MissingId)
}

fn is_node_shape(obj: &Map<String, Value>) -> bool {
    !obj.contains_key("source") && !obj.contains_key("target")
}

fn node_spec(obj: &Map<String, Value>) -> Result<NodeSpec, EntityError> {
    let position = match (
        obj.get("x").and_then(Value::as_f64),
        obj.get("y").and_then(Value::as_f64),
    ) {
        (Some(x), Some(y)) => Some(Point::new(x as f32, y as f32)),
        _ => None,
    };
    Ok(NodeSpec {
        id: parse_id(&obj["id"])?,
        name: parse_name(obj),
        position,
    })
}

fn parse_id(value: &Value) -> Result<EntityId, EntityError> {
    match value {
        Value::String(s) => Ok(EntityId::intern(s)),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(EntityId::intern(&n.to_string())),
        other => Err(EntityError::InvalidId(other.to_string())),
    }
}

fn parse_name(obj: &Map<String, Value>) -> Option<String> {
    obj.get("name").and_then(Value::as_str).map(str::to_owned)
}
