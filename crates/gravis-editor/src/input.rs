//! Raw input events.
//!
//! Primitive pointer and keyboard events as the host captures them. The
//! host resolves the event target to an `EntityKey` (or `None` for the
//! empty canvas) before handing the event over.

use gravis_core::{EntityKey, Point};
use serde::{Deserialize, Serialize};

/// Primitive event kinds. Names match the DOM event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawKind {
    Click,
    Dblclick,
    Mousedown,
    Mouseenter,
    Mouseleave,
    Mousemove,
    Mouseover,
    Mouseout,
    Mouseup,
    Keydown,
}

impl RawKind {
    pub const ALL: [RawKind; 10] = [
        RawKind::Click,
        RawKind::Dblclick,
        RawKind::Mousedown,
        RawKind::Mouseenter,
        RawKind::Mouseleave,
        RawKind::Mousemove,
        RawKind::Mouseover,
        RawKind::Mouseout,
        RawKind::Mouseup,
        RawKind::Keydown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RawKind::Click => "click",
            RawKind::Dblclick => "dblclick",
            RawKind::Mousedown => "mousedown",
            RawKind::Mouseenter => "mouseenter",
            RawKind::Mouseleave => "mouseleave",
            RawKind::Mousemove => "mousemove",
            RawKind::Mouseover => "mouseover",
            RawKind::Mouseout => "mouseout",
            RawKind::Mouseup => "mouseup",
            RawKind::Keydown => "keydown",
        }
    }
}

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };

    /// Ctrl on most platforms, ⌘ on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// One primitive event from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: RawKind,
    /// Entity under the pointer, `None` for the empty canvas.
    #[serde(default)]
    pub target: Option<EntityKey>,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Pointer coordinates in canvas space.
    #[serde(default)]
    pub position: Option<Point>,
    /// `KeyboardEvent.key` for key events.
    #[serde(default)]
    pub key: Option<String>,
}

impl RawEvent {
    pub fn new(kind: RawKind) -> Self {
        Self {
            kind,
            target: None,
            modifiers: Modifiers::NONE,
            position: None,
            key: None,
        }
    }

    pub fn click(target: Option<EntityKey>, at: Point) -> Self {
        Self::new(RawKind::Click).on(target).at(at)
    }

    pub fn dblclick(target: EntityKey) -> Self {
        Self::new(RawKind::Dblclick).on(Some(target))
    }

    pub fn enter(target: Option<EntityKey>) -> Self {
        Self::new(RawKind::Mouseenter).on(target)
    }

    pub fn leave(target: Option<EntityKey>) -> Self {
        Self::new(RawKind::Mouseleave).on(target)
    }

    pub fn keydown(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(RawKind::Keydown)
        }
    }

    pub fn on(mut self, target: Option<EntityKey>) -> Self {
        self.target = target;
        self
    }

    pub fn at(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_host_event() {
        let event: RawEvent = serde_json::from_value(json!({
            "type": "click",
            "target": { "kind": "node", "id": "a" },
            "modifiers": { "shift": true },
            "position": { "x": 10.0, "y": 20.0 }
        }))
        .unwrap();

        assert_eq!(
            event,
            RawEvent::click(Some(EntityKey::node("a")), Point::new(10.0, 20.0))
                .with_modifiers(Modifiers::SHIFT)
        );
    }

    #[test]
    fn deserialize_minimal_key_event() {
        let event: RawEvent =
            serde_json::from_value(json!({ "type": "keydown", "key": "Delete" })).unwrap();
        assert_eq!(event, RawEvent::keydown("Delete"));
        assert_eq!(event.modifiers, Modifiers::NONE);
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in RawKind::ALL {
            let value = serde_json::to_value(kind).unwrap();
            assert_eq!(value, json!(kind.name()));
        }
    }

    #[test]
    fn command_modifier() {
        assert!(Modifiers::CTRL.command());
        assert!(
            Modifiers {
                meta: true,
                ..Modifiers::NONE
            }
            .command()
        );
        assert!(!Modifiers::SHIFT.command());
    }
}
