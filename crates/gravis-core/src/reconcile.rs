//! Enter/update/exit reconciliation between the model and renderer handles.
//!
//! Each pass diffs the bound entity keys against a model snapshot:
//!
//! - **exit**: bound but no longer in the model → handle released;
//! - **enter**: in the model but unbound → new handle bound;
//! - **update**: in both → handle refreshed with the current data.
//!
//! Exits run first. Links are bound before nodes so that link handles sit
//! beneath node handles in the renderer's z-order. Every live binding is
//! then re-attached to the event sink, on every pass.

use crate::entity::{EntityKey, EntityKind};
use crate::model::{GraphModel, Snapshot};
use crate::renderer::{EntityView, Highlight, Renderer};
use crate::simulation::Frame;
use std::collections::{HashMap, HashSet};

/// Association between a logical entity and its renderer handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<H> {
    pub key: EntityKey,
    pub handle: H,
}

/// Keys grouped by what a reconciliation pass does with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub enter: Vec<EntityKey>,
    pub update: Vec<EntityKey>,
    pub exit: Vec<EntityKey>,
}

impl Delta {
    /// True when bindings were created or released, not just refreshed.
    pub fn is_structural(&self) -> bool {
        !self.enter.is_empty() || !self.exit.is_empty()
    }
}

/// Owns the bindings and keeps them in step with the model.
#[derive(Debug)]
pub struct Reconciler<H> {
    bindings: HashMap<EntityKey, H>,
    /// Binding order: links, then nodes.
    order: Vec<EntityKey>,
}

impl<H> Default for Reconciler<H> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<H: Clone + std::fmt::Debug> Reconciler<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the delta without touching anything.
    pub fn diff(&self, snapshot: &Snapshot<'_>) -> Delta {
        let mut delta = Delta::default();
        let mut current = HashSet::new();
        for key in snapshot.keys() {
            current.insert(key);
            if self.bindings.contains_key(&key) {
                delta.update.push(key);
            } else {
                delta.enter.push(key);
            }
        }
        delta.exit = self
            .order
            .iter()
            .filter(|k| !current.contains(*k))
            .copied()
            .collect();
        delta
    }

    /// Run one pass against `model`, driving `renderer`.
    pub fn reconcile<R>(&mut self, model: &GraphModel, renderer: &mut R) -> Result<Delta, R::Error>
    where
        R: Renderer<Handle = H>,
    {
        let snapshot = model.snapshot();
        let delta = self.diff(&snapshot);

        for key in &delta.exit {
            self.order.retain(|k| k != key);
            if let Some(handle) = self.bindings.remove(key)
                && !renderer.unbind(handle)?
            {
                log::trace!("{key}: handle already released");
            }
        }

        let views = snapshot
            .links
            .iter()
            .map(|l| EntityView::Link(l))
            .chain(snapshot.nodes.iter().map(|n| EntityView::Node(n)));
        for view in views {
            let key = view.key();
            match self.bindings.get(&key) {
                Some(handle) => renderer.refresh(handle, view)?,
                None => {
                    let handle = match key.kind {
                        EntityKind::Link => renderer.bind_link(key.id)?,
                        EntityKind::Node => renderer.bind_node(key.id)?,
                    };
                    log::trace!("{key}: bound {handle:?}");
                    renderer.refresh(&handle, view)?;
                    self.bindings.insert(key, handle);
                    self.order.push(key);
                }
            }
        }
        self.order = snapshot.keys().collect();

        for key in &self.order {
            if let Some(handle) = self.bindings.get(key) {
                renderer.attach_events(handle, *key)?;
            }
        }

        log::debug!(
            "reconciled: {} enter, {} update, {} exit",
            delta.enter.len(),
            delta.update.len(),
            delta.exit.len()
        );
        Ok(delta)
    }

    /// Hand a simulation frame to the renderer.
    pub fn present<R>(&self, frame: &Frame, renderer: &mut R) -> Result<(), R::Error>
    where
        R: Renderer<Handle = H>,
    {
        for (id, at) in &frame.nodes {
            if let Some(handle) = self.bindings.get(&EntityKey::node(*id)) {
                renderer.move_node(handle, *at)?;
            }
        }
        for (id, from, to) in &frame.links {
            if let Some(handle) = self.bindings.get(&EntityKey::link(*id)) {
                renderer.move_link(handle, *from, *to)?;
            }
        }
        Ok(())
    }

    /// Apply a highlight to a bound entity. Unbound keys are skipped.
    pub fn highlight<R>(
        &self,
        key: EntityKey,
        highlight: Highlight,
        renderer: &mut R,
    ) -> Result<(), R::Error>
    where
        R: Renderer<Handle = H>,
    {
        match self.bindings.get(&key) {
            Some(handle) => renderer.set_highlight(handle, highlight),
            None => {
                log::trace!("{key}: highlight skipped, not bound");
                Ok(())
            }
        }
    }

    pub fn handle(&self, key: EntityKey) -> Option<&H> {
        self.bindings.get(&key)
    }

    pub fn bindings(&self) -> impl Iterator<Item = Binding<H>> + '_ {
        self.order.iter().filter_map(|key| {
            self.bindings.get(key).map(|handle| Binding {
                key: *key,
                handle: handle.clone(),
            })
        })
    }

    pub fn bound_keys(&self) -> &[EntityKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{LinkSpec, NodeSpec};
    use crate::renderer::{RecordingRenderer, RenderCall};
    use pretty_assertions::assert_eq;

    #[test]
    fn first_pass_binds_links_before_nodes() {
        let mut model = GraphModel::new();
        model.add(LinkSpec::new("L", "a", "b"));
        let mut renderer = RecordingRenderer::new();
        let mut rec = Reconciler::new();

        let delta = rec.reconcile(&model, &mut renderer).unwrap();
        assert_eq!(
            delta.enter,
            vec![EntityKey::link("L"), EntityKey::node("a"), EntityKey::node("b")]
        );
        assert!(delta.update.is_empty());

        let binds: Vec<EntityKey> = renderer
            .calls()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Bind(key, _) => Some(*key),
                _ => None,
            })
            .collect();
        assert_eq!(binds, delta.enter);
    }

    #[test]
    fn second_pass_updates_and_reattaches() {
        let mut model = GraphModel::new();
        model.add(NodeSpec::new("a"));
        let mut renderer = RecordingRenderer::new();
        let mut rec = Reconciler::new();
        rec.reconcile(&model, &mut renderer).unwrap();
        renderer.take_calls();

        let delta = rec.reconcile(&model, &mut renderer).unwrap();
        assert_eq!(delta.update, vec![EntityKey::node("a")]);
        assert!(!delta.is_structural());
        assert_eq!(
            renderer.calls(),
            &[RenderCall::Refresh(0), RenderCall::Attach(0)]
        );
    }

    #[test]
    fn exit_releases_handles() {
        let mut model = GraphModel::new();
        model.add(LinkSpec::new("L", "a", "b"));
        let mut renderer = RecordingRenderer::new();
        let mut rec = Reconciler::new();
        rec.reconcile(&model, &mut renderer).unwrap();

        model.remove(EntityKey::node("a"));
        let delta = rec.reconcile(&model, &mut renderer).unwrap();
        assert_eq!(delta.exit, vec![EntityKey::link("L"), EntityKey::node("a")]);
        assert_eq!(rec.len(), 1);
        assert_eq!(renderer.live_count(), 1);
        assert_eq!(rec.bound_keys(), &[EntityKey::node("b")]);
    }

    #[test]
    fn externally_released_handle_is_ignored_on_exit() {
        let mut model = GraphModel::new();
        model.add(NodeSpec::new("a"));
        let mut renderer = RecordingRenderer::new();
        let mut rec = Reconciler::new();
        rec.reconcile(&model, &mut renderer).unwrap();

        let handle = *rec.handle(EntityKey::node("a")).unwrap();
        renderer.drop_externally(handle);
        model.remove(EntityKey::node("a"));

        let delta = rec.reconcile(&model, &mut renderer).unwrap();
        assert_eq!(delta.exit, vec![EntityKey::node("a")]);
        assert!(rec.is_empty());
    }

    #[test]
    fn readding_same_id_does_not_duplicate_binding() {
        let mut model = GraphModel::new();
        let mut renderer = RecordingRenderer::new();
        let mut rec = Reconciler::new();

        model.add(NodeSpec::new("a").named("first"));
        rec.reconcile(&model, &mut renderer).unwrap();
        model.add(NodeSpec::new("a").named("second"));
        let delta = rec.reconcile(&model, &mut renderer).unwrap();

        assert!(delta.enter.is_empty());
        assert_eq!(renderer.live_count(), 1);
        assert_eq!(model.node(crate::EntityId::intern("a")).unwrap().name(), "second");
    }

    #[test]
    fn highlight_skips_unbound() {
        let rec: Reconciler<u32> = Reconciler::new();
        let mut renderer = RecordingRenderer::new();
        rec.highlight(EntityKey::node("ghost"), Highlight::Selected, &mut renderer)
            .unwrap();
        assert!(renderer.calls().is_empty());
    }
}
