//! Handler Table Module
//!
//! A socket has either one global handler, up to four per-event handlers, or
//! none. The two kinds are mutually exclusive; the table returns to the empty
//! state when its last handler is removed.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{EventSet, SocketEvent};

/// Handler called once per dispatch with the full ready set
pub(crate) type GlobalHandler = Rc<RefCell<dyn FnMut(EventSet)>>;

/// Handler called for one event
pub(crate) type EventHandler = Rc<RefCell<dyn FnMut(SocketEvent)>>;

#[derive(Default)]
pub(crate) enum Handlers {
    #[default]
    Empty,
    Global(GlobalHandler),
    PerEvent([Option<EventHandler>; 4]),
}

impl Handlers {
    pub(crate) fn install_global(&mut self, handler: GlobalHandler) {
        match self {
            Handlers::Empty => *self = Handlers::Global(handler),
            Handlers::Global(_) => panic!("a global handler is already installed"),
            Handlers::PerEvent(_) => {
                panic!("cannot install a global handler while per-event handlers are installed")
            }
        }
    }

    pub(crate) fn remove_global(&mut self) {
        match self {
            Handlers::Global(_) => *self = Handlers::Empty,
            _ => panic!("no global handler is installed"),
        }
    }

    pub(crate) fn install(&mut self, event: SocketEvent, handler: EventHandler) {
        match self {
            Handlers::Empty => {
                let mut table: [Option<EventHandler>; 4] = Default::default();
                table[event.index()] = Some(handler);
                *self = Handlers::PerEvent(table);
            }
            Handlers::PerEvent(table) => {
                let slot = &mut table[event.index()];
                assert!(slot.is_none(), "a {event} handler is already installed");
                *slot = Some(handler);
            }
            Handlers::Global(_) => {
                panic!("cannot install a {event} handler while a global handler is installed")
            }
        }
    }

    pub(crate) fn remove(&mut self, event: SocketEvent) {
        let Handlers::PerEvent(table) = self else {
            panic!("no {event} handler is installed");
        };
        assert!(
            table[event.index()].take().is_some(),
            "no {event} handler is installed"
        );
        if table.iter().all(Option::is_none) {
            *self = Handlers::Empty;
        }
    }

    pub(crate) fn is_global(&self) -> bool {
        matches!(self, Handlers::Global(_))
    }

    pub(crate) fn has(&self, event: SocketEvent) -> bool {
        match self {
            Handlers::PerEvent(table) => table[event.index()].is_some(),
            _ => false,
        }
    }

    pub(crate) fn global(&self) -> Option<GlobalHandler> {
        match self {
            Handlers::Global(handler) => Some(handler.clone()),
            _ => None,
        }
    }

    pub(crate) fn get(&self, event: SocketEvent) -> Option<EventHandler> {
        match self {
            Handlers::PerEvent(table) => table[event.index()].clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_handler() -> EventHandler {
        Rc::new(RefCell::new(|_: SocketEvent| {}))
    }

    fn global_handler() -> GlobalHandler {
        Rc::new(RefCell::new(|_: EventSet| {}))
    }

    #[test]
    fn test_per_event_install_and_remove() {
        let mut handlers = Handlers::default();
        handlers.install(SocketEvent::Read, event_handler());
        handlers.install(SocketEvent::Write, event_handler());
        assert!(handlers.has(SocketEvent::Read));
        assert!(handlers.get(SocketEvent::Write).is_some());
        assert!(handlers.get(SocketEvent::Accept).is_none());

        handlers.remove(SocketEvent::Read);
        assert!(!handlers.has(SocketEvent::Read));
        handlers.remove(SocketEvent::Write);
        assert!(matches!(handlers, Handlers::Empty));
    }

    #[test]
    fn test_global_install_and_remove() {
        let mut handlers = Handlers::default();
        handlers.install_global(global_handler());
        assert!(handlers.is_global());
        assert!(handlers.global().is_some());
        assert!(!handlers.has(SocketEvent::Read));
        handlers.remove_global();
        assert!(matches!(handlers, Handlers::Empty));
    }

    #[test]
    fn test_kinds_switch_after_emptying() {
        let mut handlers = Handlers::default();
        handlers.install(SocketEvent::Connect, event_handler());
        handlers.remove(SocketEvent::Connect);
        handlers.install_global(global_handler());
        handlers.remove_global();
        handlers.install(SocketEvent::Accept, event_handler());
        assert!(handlers.has(SocketEvent::Accept));
    }

    #[test]
    #[should_panic(expected = "while a global handler is installed")]
    fn test_per_event_after_global_rejected() {
        let mut handlers = Handlers::default();
        handlers.install_global(global_handler());
        handlers.install(SocketEvent::Read, event_handler());
    }

    #[test]
    #[should_panic(expected = "while per-event handlers are installed")]
    fn test_global_after_per_event_rejected() {
        let mut handlers = Handlers::default();
        handlers.install(SocketEvent::Read, event_handler());
        handlers.install_global(global_handler());
    }

    #[test]
    #[should_panic(expected = "already installed")]
    fn test_double_install_rejected() {
        let mut handlers = Handlers::default();
        handlers.install(SocketEvent::Write, event_handler());
        handlers.install(SocketEvent::Write, event_handler());
    }

    #[test]
    #[should_panic(expected = "no read handler")]
    fn test_remove_missing_rejected() {
        let mut handlers = Handlers::default();
        handlers.install(SocketEvent::Write, event_handler());
        handlers.remove(SocketEvent::Read);
    }
}
