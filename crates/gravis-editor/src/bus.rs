//! Named event dispatch with namespaced subscribers.
//!
//! Subscribers register under `"type.name"`. Registering the same
//! `type.name` again replaces the old handler and moves it to the end of the
//! list; `off(".name")` drops that name from every type.
//!
//! Dispatch is synchronous. `call` snapshots the handler list before running
//! it, so a handler may register, unregister or dispatch again; a nested
//! dispatch runs to completion before the outer handler resumes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type Handler<T> = Rc<dyn Fn(&T)>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("unknown event type `{0}`")]
    UnknownType(String),
}

struct Listener<T> {
    kind: &'static str,
    name: String,
    handler: Handler<T>,
}

/// A per-component event bus over a fixed set of event types.
pub struct Dispatcher<T> {
    types: &'static [&'static str],
    listeners: RefCell<Vec<Listener<T>>>,
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.borrow();
        let names: Vec<String> = listeners
            .iter()
            .map(|l| format!("{}.{}", l.kind, l.name))
            .collect();
        f.debug_struct("Dispatcher")
            .field("types", &self.types)
            .field("listeners", &names)
            .finish()
    }
}

/// Split `"type.name"` into its parts. The name may be empty.
fn split(typename: &str) -> (&str, &str) {
    typename.split_once('.').unwrap_or((typename, ""))
}

impl<T> Dispatcher<T> {
    pub fn new(types: &'static [&'static str]) -> Self {
        Self {
            types,
            listeners: RefCell::new(Vec::new()),
        }
    }

    fn resolve(&self, kind: &str) -> Option<&'static str> {
        self.types.iter().copied().find(|t| *t == kind)
    }

    /// Register `handler` under `"type.name"`.
    pub fn on(&self, typename: &str, handler: impl Fn(&T) + 'static) -> Result<(), BusError> {
        let (kind, name) = split(typename);
        let kind = self
            .resolve(kind)
            .ok_or_else(|| BusError::UnknownType(kind.to_string()))?;
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|l| !(l.kind == kind && l.name == name));
        listeners.push(Listener {
            kind,
            name: name.to_string(),
            handler: Rc::new(handler),
        });
        Ok(())
    }

    /// Unregister by `"type.name"`, or by `".name"` across all types.
    /// Returns how many handlers were dropped.
    pub fn off(&self, typename: &str) -> usize {
        let (kind, name) = split(typename);
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !(l.name == name && (kind.is_empty() || l.kind == kind)));
        before - listeners.len()
    }

    pub fn has(&self, typename: &str) -> bool {
        let (kind, name) = split(typename);
        self.listeners
            .borrow()
            .iter()
            .any(|l| l.name == name && (kind.is_empty() || l.kind == kind))
    }

    /// Run every handler of `kind` in registration order.
    pub fn call(&self, kind: &str, payload: &T) {
        let handlers: Vec<Handler<T>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Rc::clone(&l.handler))
            .collect();
        if handlers.is_empty() && self.resolve(kind).is_none() {
            log::warn!("dispatch of unknown event type `{kind}`");
            return;
        }
        for handler in handlers {
            handler(payload);
        }
    }

    pub fn types(&self) -> &'static [&'static str] {
        self.types
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    const TYPES: &[&str] = &["select", "deselect"];

    fn recorder() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let bus: Dispatcher<u32> = Dispatcher::new(TYPES);
        let log = recorder();
        for name in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            bus.on(&format!("select.{name}"), move |v| {
                log.borrow_mut().push(format!("{name}{v}"))
            })
            .unwrap();
        }
        bus.call("select", &1);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn reregistering_replaces_and_moves_to_end() {
        let bus: Dispatcher<()> = Dispatcher::new(TYPES);
        let log = recorder();
        for (name, tag) in [("a", "a1"), ("b", "b"), ("a", "a2")] {
            let log = Rc::clone(&log);
            bus.on(&format!("select.{name}"), move |_| {
                log.borrow_mut().push(tag.to_string())
            })
            .unwrap();
        }
        bus.call("select", &());
        assert_eq!(*log.borrow(), vec!["b", "a2"]);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn off_by_namespace_spans_types() {
        let bus: Dispatcher<()> = Dispatcher::new(TYPES);
        bus.on("select.ui", |_| {}).unwrap();
        bus.on("deselect.ui", |_| {}).unwrap();
        bus.on("select.other", |_| {}).unwrap();

        assert!(bus.has(".ui"));
        assert_eq!(bus.off(".ui"), 2);
        assert!(!bus.has(".ui"));
        assert!(bus.has("select.other"));
        assert_eq!(bus.off("select.other"), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let bus: Dispatcher<()> = Dispatcher::new(TYPES);
        assert_eq!(
            bus.on("explode.x", |_| {}),
            Err(BusError::UnknownType("explode".into()))
        );
        bus.call("explode", &());
    }

    #[test]
    fn nested_dispatch_completes_before_outer_resumes() {
        let bus: Rc<Dispatcher<&'static str>> = Rc::new(Dispatcher::new(TYPES));
        let log = recorder();

        {
            let log = Rc::clone(&log);
            let inner = Rc::clone(&bus);
            bus.on("select.outer", move |v| {
                log.borrow_mut().push(format!("select {v} begin"));
                inner.call("deselect", v);
                log.borrow_mut().push(format!("select {v} end"));
            })
            .unwrap();
        }
        {
            let log = Rc::clone(&log);
            bus.on("deselect.inner", move |v| {
                log.borrow_mut().push(format!("deselect {v}"))
            })
            .unwrap();
        }

        bus.call("select", &"a");
        assert_eq!(
            *log.borrow(),
            vec!["select a begin", "deselect a", "select a end"]
        );
    }

    #[test]
    fn handler_may_unregister_itself() {
        let bus: Rc<Dispatcher<()>> = Rc::new(Dispatcher::new(TYPES));
        let count = Rc::new(RefCell::new(0));
        {
            let count = Rc::clone(&count);
            let inner = Rc::clone(&bus);
            bus.on("select.once", move |_| {
                *count.borrow_mut() += 1;
                inner.off("select.once");
            })
            .unwrap();
        }
        bus.call("select", &());
        bus.call("select", &());
        assert_eq!(*count.borrow(), 1);
    }
}
