//! Renderer interface.
//!
//! The core never draws. It binds entities to opaque renderer handles, moves
//! them, and tells the renderer which highlight to show. Renderer errors are
//! passed through untouched.

use crate::entity::{EntityKey, EntityKind};
use crate::id::EntityId;
use crate::model::{Link, Node, Point};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;

/// Visual emphasis of a bound entity. Later variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Highlight {
    #[default]
    Neutral,
    Hovered,
    Selected,
}

/// Typed status flags of one entity, owned by the interaction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub selected: bool,
    pub hovered: bool,
    pub toggled: bool,
}

impl Status {
    /// Selected beats hovered beats neutral.
    pub fn highlight(&self) -> Highlight {
        if self.selected {
            Highlight::Selected
        } else if self.hovered {
            Highlight::Hovered
        } else {
            Highlight::Neutral
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The entity behind a handle, passed on refresh.
#[derive(Debug, Clone, Copy)]
pub enum EntityView<'a> {
    Node(&'a Node),
    Link(&'a Link),
}

impl EntityView<'_> {
    pub fn key(&self) -> EntityKey {
        match self {
            EntityView::Node(n) => EntityKey::node(n.id()),
            EntityView::Link(l) => EntityKey::link(l.id()),
        }
    }
}

/// Whatever draws the graph.
pub trait Renderer {
    type Handle: Clone + fmt::Debug;
    type Error: std::error::Error;

    fn bind_node(&mut self, id: EntityId) -> Result<Self::Handle, Self::Error>;

    fn bind_link(&mut self, id: EntityId) -> Result<Self::Handle, Self::Error>;

    /// Release a handle. `Ok(false)` means it was already gone.
    fn unbind(&mut self, handle: Self::Handle) -> Result<bool, Self::Error>;

    /// Point an existing handle at the current entity data.
    fn refresh(&mut self, handle: &Self::Handle, entity: EntityView<'_>)
    -> Result<(), Self::Error>;

    /// (Re)wire input events of `handle` to the gesture sink. Must be idempotent.
    fn attach_events(&mut self, handle: &Self::Handle, key: EntityKey) -> Result<(), Self::Error>;

    fn move_node(&mut self, handle: &Self::Handle, at: Point) -> Result<(), Self::Error>;

    fn move_link(
        &mut self,
        handle: &Self::Handle,
        from: Point,
        to: Point,
    ) -> Result<(), Self::Error>;

    fn set_highlight(
        &mut self,
        handle: &Self::Handle,
        highlight: Highlight,
    ) -> Result<(), Self::Error>;
}

// ─── Recording renderer ──────────────────────────────────────────────────

/// One call made against a `RecordingRenderer`.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Bind(EntityKey, u32),
    Unbind(u32),
    Refresh(u32),
    Attach(u32),
    MoveNode(u32, Point),
    MoveLink(u32, Point, Point),
    Highlight(u32, Highlight),
}

/// An in-memory renderer for tests and headless hosts.
///
/// Handles are sequential integers; every call is recorded in order.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    next: u32,
    live: HashMap<u32, EntityKey>,
    highlights: HashMap<u32, Highlight>,
    positions: HashMap<u32, Point>,
    calls: Vec<RenderCall>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<RenderCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// The live handle bound to `key`, if any.
    pub fn handle_of(&self, key: EntityKey) -> Option<u32> {
        self.live
            .iter()
            .find_map(|(h, k)| (*k == key).then_some(*h))
    }

    pub fn highlight_of(&self, key: EntityKey) -> Highlight {
        self.handle_of(key)
            .and_then(|h| self.highlights.get(&h).copied())
            .unwrap_or_default()
    }

    pub fn position_of(&self, key: EntityKey) -> Option<Point> {
        self.handle_of(key).and_then(|h| self.positions.get(&h).copied())
    }

    /// Simulate the host tearing a handle down behind the core's back.
    pub fn drop_externally(&mut self, handle: u32) {
        self.live.remove(&handle);
        self.highlights.remove(&handle);
        self.positions.remove(&handle);
    }

    fn bind(&mut self, key: EntityKey) -> u32 {
        let handle = self.next;
        self.next += 1;
        self.live.insert(handle, key);
        self.calls.push(RenderCall::Bind(key, handle));
        handle
    }
}

impl Renderer for RecordingRenderer {
    type Handle = u32;
    type Error = Infallible;

    fn bind_node(&mut self, id: EntityId) -> Result<u32, Infallible> {
        Ok(self.bind(EntityKey {
            kind: EntityKind::Node,
            id,
        }))
    }

    fn bind_link(&mut self, id: EntityId) -> Result<u32, Infallible> {
        Ok(self.bind(EntityKey {
            kind: EntityKind::Link,
            id,
        }))
    }

    fn unbind(&mut self, handle: u32) -> Result<bool, Infallible> {
        self.calls.push(RenderCall::Unbind(handle));
        let existed = self.live.remove(&handle).is_some();
        self.highlights.remove(&handle);
        self.positions.remove(&handle);
        Ok(existed)
    }

    fn refresh(&mut self, handle: &u32, _entity: EntityView<'_>) -> Result<(), Infallible> {
        self.calls.push(RenderCall::Refresh(*handle));
        Ok(())
    }

    fn attach_events(&mut self, handle: &u32, _key: EntityKey) -> Result<(), Infallible> {
        self.calls.push(RenderCall::Attach(*handle));
        Ok(())
    }

    fn move_node(&mut self, handle: &u32, at: Point) -> Result<(), Infallible> {
        self.calls.push(RenderCall::MoveNode(*handle, at));
        self.positions.insert(*handle, at);
        Ok(())
    }

    fn move_link(&mut self, handle: &u32, from: Point, to: Point) -> Result<(), Infallible> {
        self.calls.push(RenderCall::MoveLink(*handle, from, to));
        Ok(())
    }

    fn set_highlight(&mut self, handle: &u32, highlight: Highlight) -> Result<(), Infallible> {
        self.calls.push(RenderCall::Highlight(*handle, highlight));
        self.highlights.insert(*handle, highlight);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_precedence() {
        let both = Status {
            selected: true,
            hovered: true,
            toggled: false,
        };
        assert_eq!(both.highlight(), Highlight::Selected);

        let hover = Status {
            hovered: true,
            ..Default::default()
        };
        assert_eq!(hover.highlight(), Highlight::Hovered);
        assert_eq!(Status::default().highlight(), Highlight::Neutral);
        assert!(Highlight::Selected > Highlight::Hovered);
    }

    #[test]
    fn recording_renderer_unbind_after_external_drop() {
        let mut r = RecordingRenderer::new();
        let h = r.bind_node(EntityId::intern("a")).unwrap();
        r.drop_externally(h);
        assert_eq!(r.unbind(h), Ok(false));
        assert_eq!(r.live_count(), 0);
    }
}
