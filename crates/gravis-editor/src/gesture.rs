//! Gesture routing: raw input → semantic intent.
//!
//! First match wins:
//!
//! 1. click + create modifier → `Create` (subject may be the canvas)
//! 2. click on an entity that is not the current selection → `Select`
//! 3. click on the empty canvas → `Deselect`
//! 4. double-click on an entity → `Toggle`
//! 5. `Delete` / `Backspace` key, whatever the focus → `Delete`
//!
//! Anything else yields no intent.

use crate::bus::{BusError, Dispatcher};
use crate::input::{Modifiers, RawEvent, RawKind};
use gravis_core::{EntityKey, Point};

/// A semantic action derived from one raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Create { subject: Option<EntityKey>, at: Point },
    Select(EntityKey),
    Deselect,
    Toggle(EntityKey),
    Delete,
}

impl Intent {
    pub const NAMES: &'static [&'static str] = &["create", "select", "deselect", "toggle", "delete"];

    pub fn name(&self) -> &'static str {
        match self {
            Intent::Create { .. } => "create",
            Intent::Select(_) => "select",
            Intent::Deselect => "deselect",
            Intent::Toggle(_) => "toggle",
            Intent::Delete => "delete",
        }
    }
}

/// Which modifier turns a click into a create gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreateModifier {
    #[default]
    Shift,
    /// Ctrl, or ⌘ on macOS.
    Ctrl,
    Either,
}

impl CreateModifier {
    pub fn is_held(self, modifiers: &Modifiers) -> bool {
        match self {
            CreateModifier::Shift => modifiers.shift,
            CreateModifier::Ctrl => modifiers.command(),
            CreateModifier::Either => modifiers.shift || modifiers.command(),
        }
    }
}

/// Whether the host should let the raw event bubble further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

const RAW_NAMES: &[&str] = &[
    "click",
    "dblclick",
    "mousedown",
    "mouseenter",
    "mouseleave",
    "mousemove",
    "mouseover",
    "mouseout",
    "mouseup",
    "keydown",
];

/// Classifies raw events and re-emits them, and their intents, to subscribers.
#[derive(Debug)]
pub struct GestureRouter {
    create_modifier: CreateModifier,
    raw: Dispatcher<RawEvent>,
    intents: Dispatcher<Intent>,
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(CreateModifier::default())
    }
}

impl GestureRouter {
    pub fn new(create_modifier: CreateModifier) -> Self {
        Self {
            create_modifier,
            raw: Dispatcher::new(RAW_NAMES),
            intents: Dispatcher::new(Intent::NAMES),
        }
    }

    pub fn create_modifier(&self) -> CreateModifier {
        self.create_modifier
    }

    /// Classify `event` given the current selection. Pure.
    pub fn route(&self, event: &RawEvent, selected: Option<EntityKey>) -> Option<Intent> {
        match event.kind {
            RawKind::Click if self.create_modifier.is_held(&event.modifiers) => {
                Some(Intent::Create {
                    subject: event.target,
                    at: event.position.unwrap_or_default(),
                })
            }
            RawKind::Click => match event.target {
                Some(key) if Some(key) != selected => Some(Intent::Select(key)),
                Some(_) => None,
                None => Some(Intent::Deselect),
            },
            RawKind::Dblclick => event.target.map(Intent::Toggle),
            RawKind::Keydown => match event.key.as_deref() {
                Some("Delete" | "Backspace") => Some(Intent::Delete),
                _ => None,
            },
            _ => None,
        }
    }

    /// Re-emit `event`, classify it and emit the resulting intent.
    ///
    /// Returns the intent, if any, and whether the host should stop the
    /// raw event from reaching outer listeners.
    pub fn dispatch(
        &self,
        event: &RawEvent,
        selected: Option<EntityKey>,
    ) -> (Option<Intent>, Propagation) {
        self.raw.call(event.kind.name(), event);
        match self.route(event, selected) {
            Some(intent) => {
                log::debug!("{} → {}", event.kind.name(), intent.name());
                self.intents.call(intent.name(), &intent);
                (Some(intent), Propagation::Stop)
            }
            None => (None, Propagation::Continue),
        }
    }

    /// Subscribe to an intent, e.g. `"select.toolbar"`.
    pub fn on(&self, typename: &str, handler: impl Fn(&Intent) + 'static) -> Result<(), BusError> {
        self.intents.on(typename, handler)
    }

    /// Subscribe to a raw event kind, e.g. `"mousemove.status"`.
    pub fn on_raw(
        &self,
        typename: &str,
        handler: impl Fn(&RawEvent) + 'static,
    ) -> Result<(), BusError> {
        self.raw.on(typename, handler)
    }

    pub fn intents(&self) -> &Dispatcher<Intent> {
        &self.intents
    }

    pub fn raw_events(&self) -> &Dispatcher<RawEvent> {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    const AT: Point = Point::new(10.0, 20.0);

    fn a() -> EntityKey {
        EntityKey::node("a")
    }

    #[test]
    fn create_wins_over_select() {
        let router = GestureRouter::default();
        let event = RawEvent::click(Some(a()), AT).with_modifiers(Modifiers::SHIFT);
        assert_eq!(
            router.route(&event, None),
            Some(Intent::Create {
                subject: Some(a()),
                at: AT
            })
        );
    }

    #[test]
    fn create_on_canvas_has_no_subject() {
        let router = GestureRouter::default();
        let event = RawEvent::click(None, AT).with_modifiers(Modifiers::SHIFT);
        assert_eq!(
            router.route(&event, Some(a())),
            Some(Intent::Create {
                subject: None,
                at: AT
            })
        );
    }

    #[test]
    fn create_modifier_is_configurable() {
        let shift_click = RawEvent::click(None, AT).with_modifiers(Modifiers::SHIFT);
        let ctrl_click = RawEvent::click(None, AT).with_modifiers(Modifiers::CTRL);

        let ctrl = GestureRouter::new(CreateModifier::Ctrl);
        assert_eq!(ctrl.route(&shift_click, None), Some(Intent::Deselect));
        assert!(matches!(ctrl.route(&ctrl_click, None), Some(Intent::Create { .. })));

        let either = GestureRouter::new(CreateModifier::Either);
        assert!(matches!(either.route(&shift_click, None), Some(Intent::Create { .. })));
        assert!(matches!(either.route(&ctrl_click, None), Some(Intent::Create { .. })));
    }

    #[test]
    fn click_selects_unless_already_selected() {
        let router = GestureRouter::default();
        let click = RawEvent::click(Some(a()), AT);
        assert_eq!(router.route(&click, None), Some(Intent::Select(a())));
        assert_eq!(
            router.route(&click, Some(EntityKey::node("b"))),
            Some(Intent::Select(a()))
        );
        assert_eq!(router.route(&click, Some(a())), None);
    }

    #[test]
    fn canvas_click_deselects() {
        let router = GestureRouter::default();
        assert_eq!(
            router.route(&RawEvent::click(None, AT), Some(a())),
            Some(Intent::Deselect)
        );
    }

    #[test]
    fn dblclick_toggles_entities_only() {
        let router = GestureRouter::default();
        assert_eq!(
            router.route(&RawEvent::dblclick(a()), None),
            Some(Intent::Toggle(a()))
        );
        assert_eq!(router.route(&RawEvent::new(RawKind::Dblclick), None), None);
    }

    #[test]
    fn delete_keys_regardless_of_target() {
        let router = GestureRouter::default();
        for key in ["Delete", "Backspace"] {
            let event = RawEvent::keydown(key).on(Some(EntityKey::link("L")));
            assert_eq!(router.route(&event, None), Some(Intent::Delete));
        }
        assert_eq!(router.route(&RawEvent::keydown("Escape"), None), None);
    }

    #[test]
    fn hover_events_produce_no_intent() {
        let router = GestureRouter::default();
        let (intent, propagation) = router.dispatch(&RawEvent::enter(Some(a())), None);
        assert_eq!(intent, None);
        assert_eq!(propagation, Propagation::Continue);
    }

    #[test]
    fn dispatch_emits_raw_then_intent_and_stops() {
        let router = GestureRouter::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = Rc::clone(&log);
            router
                .on_raw("click.test", move |e| {
                    log.borrow_mut().push(format!("raw {}", e.kind.name()))
                })
                .unwrap();
        }
        {
            let log = Rc::clone(&log);
            router
                .on("select.test", move |i| {
                    log.borrow_mut().push(format!("intent {}", i.name()))
                })
                .unwrap();
        }

        let (intent, propagation) = router.dispatch(&RawEvent::click(Some(a()), AT), None);
        assert_eq!(intent, Some(Intent::Select(a())));
        assert_eq!(propagation, Propagation::Stop);
        assert_eq!(*log.borrow(), vec!["raw click", "intent select"]);
    }
}
