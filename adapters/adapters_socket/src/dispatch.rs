//! Dispatch Safety Layer
//!
//! Delivers a readiness batch to the handlers of one socket while tolerating a
//! handler that frees the socket it was called for.
//!
//! Every socket gets a process-unique [`InstanceId`] at open and is entered in
//! a per-thread liveness registry. Freeing a socket retires its id. The
//! dispatcher holds only a weak reference to the socket state and looks the id
//! up again after every handler returns; once the id is retired, the rest of
//! the batch is abandoned and the state is never touched again.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::event::{EventSet, SocketEvent};
use crate::socket::SocketState;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static LIVE: RefCell<HashSet<InstanceId>> = RefCell::new(HashSet::new());
}

/// Process-unique, monotonically increasing socket identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Get the numeric id
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Allocate an id and mark it live
pub(crate) fn register() -> InstanceId {
    let id = InstanceId(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed));
    LIVE.with(|live| live.borrow_mut().insert(id));
    id
}

/// Mark an id dead; it is never reused
pub(crate) fn retire(id: InstanceId) {
    LIVE.with(|live| live.borrow_mut().remove(&id));
}

/// Check whether the socket with this id is still open
pub fn is_live(id: InstanceId) -> bool {
    LIVE.with(|live| live.borrow().contains(&id))
}

/// Read socket state if the socket is still live
fn with_live<R>(
    state: &Weak<RefCell<SocketState>>,
    id: InstanceId,
    read: impl FnOnce(&SocketState) -> R,
) -> Option<R> {
    if !is_live(id) {
        return None;
    }
    let state = state.upgrade()?;
    let state = state.borrow();
    Some(read(&state))
}

/// Deliver one readiness batch
///
/// A global handler is called once with the whole set. Otherwise per-event
/// handlers run in [`SocketEvent::DISPATCH_ORDER`]. Before each call the
/// handler and the enablement of its event are re-read, since an earlier
/// handler in the batch may have changed them.
pub(crate) fn dispatch(state: &Weak<RefCell<SocketState>>, id: InstanceId, events: EventSet) {
    if events.is_empty() {
        return;
    }

    let Some(global) = with_live(state, id, |st| st.handlers.global()) else {
        return;
    };
    if let Some(global) = global {
        (global.borrow_mut())(events);
        return;
    }

    for event in events.events() {
        let handler = with_live(state, id, |st| {
            if st.wait_events.contains(event.as_set()) {
                st.handlers.get(event)
            } else {
                None
            }
        });
        let handler = match handler {
            None => {
                trace!(id = id.get(), %event, "socket freed during dispatch");
                return;
            }
            Some(None) => continue,
            Some(Some(handler)) => handler,
        };
        (handler.borrow_mut())(event);
    }
}
