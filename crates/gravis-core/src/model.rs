//! Core graph data model.
//!
//! Nodes and links live in an arena (a petgraph `StableDiGraph`) keyed by
//! `EntityId`. Links store endpoint ids, never references, and every node
//! keeps the ids of its incident links so a node removal can cascade to
//! exactly the links that touch it.
//!
//! Invariants held after every public call:
//! - every link's `source` and `target` resolve to a node in the model;
//! - `node.incident()` is exactly the set of links naming that node as an
//!   endpoint.

use crate::entity::{Entity, EntityKey, EntityKind, LinkSpec, NodeSpec};
use crate::id::EntityId;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

// ─── Geometry ────────────────────────────────────────────────────────────

/// A position in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

// ─── Entities ────────────────────────────────────────────────────────────

/// A node in the graph.
///
/// Position fields are read-only outside the crate: after creation only the
/// simulation adapter moves nodes.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    id: EntityId,
    name: String,
    x: f32,
    y: f32,
    incident: SmallVec<[EntityId; 4]>,
    #[serde(skip)]
    placed: bool,
}

impl Node {
    fn from_spec(spec: NodeSpec) -> Self {
        let position = spec.position;
        Self {
            id: spec.id,
            name: spec.name.unwrap_or_default(),
            x: position.map_or(0.0, |p| p.x),
            y: position.map_or(0.0, |p| p.y),
            incident: SmallVec::new(),
            placed: position.is_some(),
        }
    }

    /// Overwrite with the fields present in `spec`.
    fn merge(&mut self, spec: NodeSpec) {
        if let Some(name) = spec.name {
            self.name = name;
        }
        if let Some(p) = spec.position {
            self.place(p);
        }
    }

    pub(crate) fn place(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
        self.placed = true;
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// False until a position was supplied or the layout assigned one.
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// Ids of the links that use this node as source or target.
    pub fn incident(&self) -> &[EntityId] {
        &self.incident
    }

    fn attach(&mut self, link: EntityId) {
        if !self.incident.contains(&link) {
            self.incident.push(link);
        }
    }

    fn detach(&mut self, link: EntityId) {
        self.incident.retain(|l| *l != link);
    }
}

/// A link between two nodes, referenced by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    id: EntityId,
    name: String,
    source: EntityId,
    target: EntityId,
}

impl Link {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> EntityId {
        self.source
    }

    pub fn target(&self) -> EntityId {
        self.target
    }
}

// ─── Change reports ──────────────────────────────────────────────────────

/// What a single `add` or `remove` call did to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Change {
    pub inserted: SmallVec<[EntityKey; 3]>,
    pub updated: SmallVec<[EntityKey; 3]>,
    /// Cascaded links come before the node that owned them.
    pub removed: Vec<EntityKey>,
}

impl Change {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// True when the node/link set changed (not just payloads).
    pub fn is_structural(&self) -> bool {
        !self.inserted.is_empty() || !self.removed.is_empty()
    }
}

/// A broken model invariant. Never expected; reported as a logic bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("link `{link}` references missing node `{node}`")]
    DanglingReference { link: EntityId, node: EntityId },
    #[error("incident links of node `{node}` do not match the link table")]
    IncidenceMismatch { node: EntityId },
}

/// Read-only, insertion-ordered view of the model.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub nodes: Vec<&'a Node>,
    pub links: Vec<&'a Link>,
}

impl Snapshot<'_> {
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.links
            .iter()
            .map(|l| EntityKey::link(l.id))
            .chain(self.nodes.iter().map(|n| EntityKey::node(n.id)))
    }
}

// ─── Graph model ─────────────────────────────────────────────────────────

/// Owns all nodes and links and enforces referential integrity.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    graph: StableDiGraph<Node, Link>,
    node_index: HashMap<EntityId, NodeIndex>,
    link_index: HashMap<EntityId, EdgeIndex>,
    node_order: Vec<EntityId>,
    link_order: Vec<EntityId>,
    revision: u64,
}

impl GraphModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entity by id.
    ///
    /// A link first adds its source and target nodes, so inline endpoint
    /// payloads create those nodes. Fields absent from a payload keep their
    /// stored value.
    pub fn add(&mut self, entity: impl Into<Entity>) -> Change {
        let mut change = Change::default();
        match entity.into() {
            Entity::Node(spec) => self.upsert_node(spec, &mut change),
            Entity::Link(spec) => self.upsert_link(spec, &mut change),
        }
        self.finish(&change);
        change
    }

    /// Classify and add a loose value. Malformed input is a logged no-op.
    pub fn add_value(&mut self, value: &Value) -> Change {
        match Entity::from_value(value) {
            Ok(entity) => self.add(entity),
            Err(err) => {
                log::debug!("add rejected: {err}");
                Change::default()
            }
        }
    }

    /// Remove an entity. Removing a node removes its incident links first.
    pub fn remove(&mut self, key: EntityKey) -> Change {
        let mut change = Change::default();
        match key.kind {
            EntityKind::Node => self.remove_node(key.id, &mut change),
            EntityKind::Link => self.remove_link(key.id, &mut change),
        }
        self.finish(&change);
        change
    }

    /// Classify and remove a loose value. Malformed input is a logged no-op.
    pub fn remove_value(&mut self, value: &Value) -> Change {
        match Entity::from_value(value) {
            Ok(entity) => self.remove(entity.key()),
            Err(err) => {
                log::debug!("remove rejected: {err}");
                Change::default()
            }
        }
    }

    /// Remove everything.
    pub fn clear(&mut self) -> Change {
        let mut change = Change::default();
        change
            .removed
            .extend(self.link_order.drain(..).map(EntityKey::link));
        change
            .removed
            .extend(self.node_order.drain(..).map(EntityKey::node));
        self.graph.clear();
        self.node_index.clear();
        self.link_index.clear();
        self.finish(&change);
        change
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            nodes: self.nodes().collect(),
            links: self.links().collect(),
        }
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.node_order.iter().filter_map(|id| self.node(*id))
    }

    /// Links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.link_order.iter().filter_map(|id| self.link(*id))
    }

    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.node_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn link(&self, id: EntityId) -> Option<&Link> {
        self.link_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Resolve a link's endpoints.
    pub fn endpoints(&self, link: &Link) -> Option<(&Node, &Node)> {
        Some((self.node(link.source)?, self.node(link.target)?))
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        match key.kind {
            EntityKind::Node => self.node_index.contains_key(&key.id),
            EntityKind::Link => self.link_index.contains_key(&key.id),
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn link_count(&self) -> usize {
        self.link_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_index.is_empty() && self.link_index.is_empty()
    }

    /// Bumped whenever the node/link set or a link's endpoints change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Move a node. Reserved for the simulation adapter.
    pub(crate) fn place(&mut self, id: EntityId, p: Point) {
        if let Some(&idx) = self.node_index.get(&id) {
            self.graph[idx].place(p);
        }
    }

    /// Verify both link-endpoint and incidence invariants.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let mut expected: HashMap<EntityId, HashSet<EntityId>> = HashMap::new();
        for link in self.links() {
            for end in [link.source, link.target] {
                if !self.node_index.contains_key(&end) {
                    return Err(IntegrityError::DanglingReference {
                        link: link.id,
                        node: end,
                    });
                }
                expected.entry(end).or_default().insert(link.id);
            }
        }
        for node in self.nodes() {
            let actual: HashSet<EntityId> = node.incident.iter().copied().collect();
            let wanted = expected.remove(&node.id).unwrap_or_default();
            if actual != wanted || actual.len() != node.incident.len() {
                return Err(IntegrityError::IncidenceMismatch { node: node.id });
            }
        }
        Ok(())
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn upsert_node(&mut self, spec: NodeSpec, change: &mut Change) {
        let id = spec.id;
        match self.node_index.get(&id) {
            Some(&idx) => {
                self.graph[idx].merge(spec);
                change.updated.push(EntityKey::node(id));
            }
            None => {
                let idx = self.graph.add_node(Node::from_spec(spec));
                self.node_index.insert(id, idx);
                self.node_order.push(id);
                change.inserted.push(EntityKey::node(id));
            }
        }
    }

    fn upsert_link(&mut self, spec: LinkSpec, change: &mut Change) {
        let LinkSpec {
            id,
            name,
            source,
            target,
        } = spec;
        let (source_id, target_id) = (source.id, target.id);
        self.upsert_node(source, change);
        self.upsert_node(target, change);

        let (Some(&s), Some(&t)) = (
            self.node_index.get(&source_id),
            self.node_index.get(&target_id),
        ) else {
            log::error!("link {id}: endpoints vanished during insert");
            return;
        };

        if let Some(&edge) = self.link_index.get(&id) {
            let link = &mut self.graph[edge];
            if let Some(name) = name.clone() {
                link.name = name;
            }
            if link.source == source_id && link.target == target_id {
                change.updated.push(EntityKey::link(id));
                return;
            }
            // Endpoints changed: rewire, keeping the link's place in the order.
            let old_name = link.name.clone();
            self.detach_link(id, edge);
            let edge = self.graph.add_edge(
                s,
                t,
                Link {
                    id,
                    name: old_name,
                    source: source_id,
                    target: target_id,
                },
            );
            self.link_index.insert(id, edge);
            self.graph[s].attach(id);
            self.graph[t].attach(id);
            // The edge set changed even though no key did.
            self.revision += 1;
            change.updated.push(EntityKey::link(id));
            return;
        }

        let edge = self.graph.add_edge(
            s,
            t,
            Link {
                id,
                name: name.unwrap_or_default(),
                source: source_id,
                target: target_id,
            },
        );
        self.link_index.insert(id, edge);
        self.link_order.push(id);
        self.graph[s].attach(id);
        self.graph[t].attach(id);
        change.inserted.push(EntityKey::link(id));
    }

    fn remove_node(&mut self, id: EntityId, change: &mut Change) {
        let Some(&idx) = self.node_index.get(&id) else {
            return;
        };
        let incident: SmallVec<[EntityId; 4]> = self.graph[idx].incident.clone();
        for link in incident {
            self.remove_link(link, change);
        }
        self.graph.remove_node(idx);
        self.node_index.remove(&id);
        self.node_order.retain(|n| *n != id);
        change.removed.push(EntityKey::node(id));
    }

    fn remove_link(&mut self, id: EntityId, change: &mut Change) {
        let Some(edge) = self.link_index.remove(&id) else {
            return;
        };
        self.detach_link(id, edge);
        self.link_order.retain(|l| *l != id);
        change.removed.push(EntityKey::link(id));
    }

    /// Drop the edge and strip the link from both endpoints' incidence.
    fn detach_link(&mut self, id: EntityId, edge: EdgeIndex) {
        if let Some(link) = self.graph.remove_edge(edge) {
            for end in [link.source, link.target] {
                if let Some(&n) = self.node_index.get(&end) {
                    self.graph[n].detach(id);
                }
            }
        }
    }

    fn finish(&mut self, change: &Change) {
        if change.is_structural() {
            self.revision += 1;
        }
        if cfg!(debug_assertions) {
            let checked = self.check_integrity();
            if let Err(err) = &checked {
                log::error!("graph integrity violated: {err}");
            }
            debug_assert!(checked.is_ok(), "graph integrity violated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids(it: impl Iterator<Item = EntityId>) -> Vec<String> {
        it.map(|id| id.as_str().to_owned()).collect()
    }

    #[test]
    fn add_node_and_snapshot() {
        let mut g = GraphModel::new();
        let change = g.add(NodeSpec::new("a").named("A"));
        assert_eq!(change.inserted.as_slice(), &[EntityKey::node("a")]);

        let snap = g.snapshot();
        assert_eq!(snap.nodes.len(), 1);
        assert_eq!(snap.nodes[0].name(), "A");
        assert!(snap.links.is_empty());
    }

    #[test]
    fn link_inserts_missing_endpoints() {
        let mut g = GraphModel::new();
        let change = g.add(LinkSpec::new("L", "a", "b"));
        assert_eq!(
            change.inserted.as_slice(),
            &[EntityKey::node("a"), EntityKey::node("b"), EntityKey::link("L")]
        );
        assert_eq!(g.node_count(), 2);
        assert_eq!(ids(g.node(EntityId::intern("b")).unwrap().incident().iter().copied()), ["L"]);
    }

    #[test]
    fn overwrite_keeps_order_and_unspecified_fields() {
        let mut g = GraphModel::new();
        g.add(NodeSpec::new("a").named("A").at(5.0, 6.0));
        g.add(NodeSpec::new("b"));
        let change = g.add(NodeSpec::new("a").named("A2"));
        assert_eq!(change.updated.as_slice(), &[EntityKey::node("a")]);
        assert!(!change.is_structural());

        let a = g.node(EntityId::intern("a")).unwrap();
        assert_eq!(a.name(), "A2");
        assert_eq!(a.position(), Point::new(5.0, 6.0));
        assert_eq!(ids(g.nodes().map(Node::id)), ["a", "b"]);
    }

    #[test]
    fn link_endpoint_payload_does_not_clobber_names() {
        let mut g = GraphModel::new();
        g.add(NodeSpec::new("a").named("A"));
        g.add(LinkSpec::new("L", "a", "b"));
        assert_eq!(g.node(EntityId::intern("a")).unwrap().name(), "A");
    }

    #[test]
    fn relinking_moves_incidence() {
        let mut g = GraphModel::new();
        g.add(LinkSpec::new("L", "a", "b"));
        g.add(LinkSpec::new("L", "a", "c"));

        assert_eq!(g.link_count(), 1);
        assert!(g.node(EntityId::intern("b")).unwrap().incident().is_empty());
        assert_eq!(ids(g.node(EntityId::intern("c")).unwrap().incident().iter().copied()), ["L"]);
        assert_eq!(g.link(EntityId::intern("L")).unwrap().target(), EntityId::intern("c"));
    }

    #[test]
    fn self_loop_is_incident_once() {
        let mut g = GraphModel::new();
        g.add(LinkSpec::new("loop", "a", "a"));
        assert_eq!(g.node(EntityId::intern("a")).unwrap().incident().len(), 1);

        let change = g.remove(EntityKey::node("a"));
        assert_eq!(change.removed, vec![EntityKey::link("loop"), EntityKey::node("a")]);
        assert!(g.is_empty());
    }

    #[test]
    fn remove_node_cascades_all_incident_links() {
        let mut g = GraphModel::new();
        g.add(LinkSpec::new("ab", "a", "b"));
        g.add(LinkSpec::new("ac", "a", "c"));
        g.add(LinkSpec::new("ca", "c", "a"));
        g.add(LinkSpec::new("bc", "b", "c"));

        let change = g.remove(EntityKey::node("a"));
        assert_eq!(change.removed.len(), 4);
        assert_eq!(change.removed.last(), Some(&EntityKey::node("a")));
        assert_eq!(ids(g.links().map(Link::id)), ["bc"]);
        assert!(g.check_integrity().is_ok());
    }

    #[test]
    fn remove_link_detaches_endpoints() {
        let mut g = GraphModel::new();
        g.add(LinkSpec::new("L", "a", "b"));
        g.remove(EntityKey::link("L"));
        assert_eq!(g.node_count(), 2);
        assert!(g.node(EntityId::intern("a")).unwrap().incident().is_empty());
    }

    #[test]
    fn malformed_values_are_noops() {
        let mut g = GraphModel::new();
        g.add_value(&json!({"id": "a"}));
        let rev = g.revision();

        assert!(g.add_value(&json!(null)).is_empty());
        assert!(g.add_value(&json!({"name": "no id"})).is_empty());
        assert!(g.add_value(&json!({"id": "L", "source": {"id": "a"}})).is_empty());
        assert!(g.remove_value(&json!({"source": {"id": "a"}})).is_empty());

        assert_eq!(g.revision(), rev);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.link_count(), 0);
    }

    #[test]
    fn node_and_link_ids_are_separate_namespaces() {
        let mut g = GraphModel::new();
        g.add_value(&json!({"id": 0, "name": "A"}));
        g.add_value(&json!({"id": 1, "name": "B"}));
        g.add_value(&json!({"id": 0, "source": {"id": 0}, "target": {"id": 1}, "name": "r"}));

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.link_count(), 1);
        assert_eq!(g.link(EntityId::intern("0")).unwrap().name(), "r");
        assert_eq!(g.node(EntityId::intern("0")).unwrap().name(), "A");
    }

    #[test]
    fn clear_reports_links_before_nodes() {
        let mut g = GraphModel::new();
        g.add(LinkSpec::new("L", "a", "b"));
        let change = g.clear();
        assert_eq!(change.removed[0], EntityKey::link("L"));
        assert!(g.is_empty());
        assert_eq!(g.snapshot().keys().count(), 0);
    }

    #[test]
    fn snapshot_keys_list_links_first() {
        let mut g = GraphModel::new();
        g.add(LinkSpec::new("L", "a", "b"));
        let keys: Vec<EntityKey> = g.snapshot().keys().collect();
        assert_eq!(
            keys,
            vec![EntityKey::link("L"), EntityKey::node("a"), EntityKey::node("b")]
        );
    }
}
