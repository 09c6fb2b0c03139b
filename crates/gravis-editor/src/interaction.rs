//! Selection and hover state machine.
//!
//! Selection is `Idle` or `Selected(key)`; hover is tracked independently.
//! Every transition updates the per-entity `Status` table, queues the
//! affected keys for a highlight refresh, and emits an `Action`.
//!
//! At most one entity carries `selected`. Selecting while something else is
//! selected emits the deselect first; the status table is audited after
//! each transition and stray flags are cleared.

use crate::bus::{BusError, Dispatcher};
use crate::gesture::Intent;
use gravis_core::{
    Change, EntityId, EntityKey, GraphModel, Highlight, LinkSpec, NodeSpec, Point, Status,
};
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Idle,
    Selected(EntityKey),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hover {
    #[default]
    None,
    Hovered(EntityKey),
}

/// Side effects of interaction transitions, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Select(EntityKey),
    Deselect(EntityKey),
    Hover(EntityKey),
    Unhover(EntityKey),
    Create(Vec<EntityKey>),
    Delete(Vec<EntityKey>),
    Toggle { key: EntityKey, on: bool },
}

impl Action {
    pub const NAMES: &'static [&'static str] = &[
        "select", "deselect", "hover", "unhover", "create", "delete", "toggle",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Select(_) => "select",
            Action::Deselect(_) => "deselect",
            Action::Hover(_) => "hover",
            Action::Unhover(_) => "unhover",
            Action::Create(_) => "create",
            Action::Delete(_) => "delete",
            Action::Toggle { .. } => "toggle",
        }
    }
}

#[derive(Debug)]
pub struct InteractionState {
    selection: Selection,
    hover: Hover,
    status: HashMap<EntityKey, Status>,
    /// Keys whose highlight may have changed since the last drain.
    dirty: SmallVec<[EntityKey; 4]>,
    actions: Dispatcher<Action>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionState {
    pub fn new() -> Self {
        Self {
            selection: Selection::Idle,
            hover: Hover::None,
            status: HashMap::new(),
            dirty: SmallVec::new(),
            actions: Dispatcher::new(Action::NAMES),
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected(&self) -> Option<EntityKey> {
        match self.selection {
            Selection::Selected(key) => Some(key),
            Selection::Idle => None,
        }
    }

    pub fn hover(&self) -> Hover {
        self.hover
    }

    pub fn hovered(&self) -> Option<EntityKey> {
        match self.hover {
            Hover::Hovered(key) => Some(key),
            Hover::None => None,
        }
    }

    pub fn status(&self, key: EntityKey) -> Status {
        self.status.get(&key).copied().unwrap_or_default()
    }

    /// Every key currently flagged `selected`.
    pub fn selected_flags(&self) -> Vec<EntityKey> {
        self.status
            .iter()
            .filter(|(_, s)| s.selected)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Subscribe to an action, e.g. `"deselect.sidebar"`.
    pub fn on(&self, typename: &str, handler: impl Fn(&Action) + 'static) -> Result<(), BusError> {
        self.actions.on(typename, handler)
    }

    pub fn actions(&self) -> &Dispatcher<Action> {
        &self.actions
    }

    /// Carry out `intent`. Returns the model change it caused, if any.
    pub fn apply(&mut self, intent: &Intent, model: &mut GraphModel) -> Change {
        match intent {
            Intent::Select(key) => self.select(*key),
            Intent::Deselect => self.deselect(),
            Intent::Toggle(key) => self.toggle(*key),
            Intent::Create { subject, at } => return self.create(*subject, *at, model),
            Intent::Delete => return self.delete(model),
        }
        Change::default()
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select(&mut self, key: EntityKey) {
        match self.selection {
            Selection::Selected(current) if current == key => return,
            Selection::Selected(_) => self.deselect(),
            Selection::Idle => {}
        }
        self.selection = Selection::Selected(key);
        self.flag(key, |s| s.selected = true);
        self.emit(Action::Select(key));
        self.audit_selection();
    }

    pub fn deselect(&mut self) {
        if let Selection::Selected(key) = self.selection {
            self.selection = Selection::Idle;
            self.flag(key, |s| s.selected = false);
            self.emit(Action::Deselect(key));
        }
        self.audit_selection();
    }

    // ─── Hover ───────────────────────────────────────────────────────────

    /// Pointer entered `target` (`None` for the canvas). Any previous hover
    /// is cleared first.
    pub fn hover_enter(&mut self, target: Option<EntityKey>) {
        self.hover_leave();
        if let Some(key) = target {
            self.hover = Hover::Hovered(key);
            self.flag(key, |s| s.hovered = true);
            self.emit(Action::Hover(key));
        }
    }

    pub fn hover_leave(&mut self) {
        if let Hover::Hovered(key) = self.hover {
            self.hover = Hover::None;
            self.flag(key, |s| s.hovered = false);
            self.emit(Action::Unhover(key));
        }
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Create at `at`:
    ///
    /// - nothing selected: a floating node;
    /// - `subject` is another existing node: a link from the selection to it;
    /// - otherwise: a new node linked from the selection.
    pub fn create(
        &mut self,
        subject: Option<EntityKey>,
        at: Point,
        model: &mut GraphModel,
    ) -> Change {
        self.forget_missing(model);
        let change = match self.selected() {
            None => model.add(NodeSpec::new(EntityId::generate()).at(at.x, at.y)),
            Some(selected) if !selected.is_node() => {
                log::debug!("create from {selected} ignored: links cannot be endpoints");
                Change::default()
            }
            Some(selected) => match subject {
                Some(target)
                    if target.is_node() && target != selected && model.contains(target) =>
                {
                    model.add(LinkSpec::new(EntityId::generate(), selected.id, target.id))
                }
                _ => {
                    let fresh = NodeSpec::new(EntityId::generate()).at(at.x, at.y);
                    model.add(LinkSpec::new(EntityId::generate(), selected.id, fresh))
                }
            },
        };
        if !change.inserted.is_empty() {
            self.emit(Action::Create(change.inserted.to_vec()));
        }
        change
    }

    /// Remove the selected entity. No-op from `Idle`.
    pub fn delete(&mut self, model: &mut GraphModel) -> Change {
        self.forget_missing(model);
        let Some(key) = self.selected() else {
            return Change::default();
        };
        let change = model.remove(key);
        for removed in &change.removed {
            self.forget(*removed);
        }
        if !change.removed.is_empty() {
            self.emit(Action::Delete(change.removed.clone()));
        }
        change
    }

    /// Flip the `toggled` flag of `key`.
    pub fn toggle(&mut self, key: EntityKey) {
        let on = !self.status(key).toggled;
        self.status.entry(key).or_default().toggled = on;
        self.prune(key);
        self.emit(Action::Toggle { key, on });
    }

    /// Drop selection, hover and status of entities no longer in `model`.
    pub fn forget_missing(&mut self, model: &GraphModel) {
        let mut stale: Vec<EntityKey> = Vec::new();
        let known = self
            .selected()
            .into_iter()
            .chain(self.hovered())
            .chain(self.status.keys().copied());
        for key in known {
            if !model.contains(key) && !stale.contains(&key) {
                stale.push(key);
            }
        }
        for key in stale {
            log::trace!("{key}: forgotten, no longer in model");
            self.forget(key);
        }
    }

    /// Drain keys whose highlight changed, paired with their new highlight.
    pub fn take_highlight_changes(&mut self) -> Vec<(EntityKey, Highlight)> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .map(|key| (key, self.status(key).highlight()))
            .collect()
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn emit(&self, action: Action) {
        self.actions.call(action.name(), &action);
    }

    fn flag(&mut self, key: EntityKey, set: impl FnOnce(&mut Status)) {
        set(self.status.entry(key).or_default());
        self.prune(key);
        if !self.dirty.contains(&key) {
            self.dirty.push(key);
        }
    }

    fn prune(&mut self, key: EntityKey) {
        if self.status.get(&key).is_some_and(Status::is_empty) {
            self.status.remove(&key);
        }
    }

    /// Clear state for an entity that left the model. Its handle is gone,
    /// so no highlight is queued.
    fn forget(&mut self, key: EntityKey) {
        if self.selected() == Some(key) {
            self.selection = Selection::Idle;
            self.emit(Action::Deselect(key));
        }
        if self.hovered() == Some(key) {
            self.hover = Hover::None;
            self.emit(Action::Unhover(key));
        }
        self.status.remove(&key);
        self.dirty.retain(|k| *k != key);
    }

    /// Keep at most one `selected` flag: the current selection's.
    fn audit_selection(&mut self) {
        let current = self.selected();
        let strays: Vec<EntityKey> = self
            .selected_flags()
            .into_iter()
            .filter(|k| Some(*k) != current)
            .collect();
        for key in strays {
            log::warn!("{key}: stray selection flag cleared");
            self.flag(key, |s| s.selected = false);
        }
    }

    #[cfg(test)]
    fn force_flag(&mut self, key: EntityKey) {
        self.status.entry(key).or_default().selected = true;
    }
}
