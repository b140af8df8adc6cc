//! Socket Event Module
//!
//! The four socket events and the event sets handlers subscribe to.

use std::fmt;

bitflags::bitflags! {
    /// Set of socket events
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventSet: u8 {
        /// Data can be received
        const READ = 0b0001;
        /// Data can be sent
        const WRITE = 0b0010;
        /// A connection is waiting to be accepted
        const ACCEPT = 0b0100;
        /// A pending connect has completed
        const CONNECT = 0b1000;
    }
}

impl EventSet {
    /// Check that the set describes a single socket role
    ///
    /// READ and WRITE belong to a data socket, ACCEPT to a listener and
    /// CONNECT to a connecting socket. At most one role may be present.
    pub fn is_coherent(self) -> bool {
        let data = self.intersects(EventSet::READ | EventSet::WRITE);
        let roles = [data, self.contains(EventSet::ACCEPT), self.contains(EventSet::CONNECT)];
        roles.iter().filter(|present| **present).count() <= 1
    }

    /// Events of the set in dispatch order
    pub fn events(self) -> impl Iterator<Item = SocketEvent> {
        SocketEvent::DISPATCH_ORDER
            .into_iter()
            .filter(move |event| self.contains(event.as_set()))
    }
}

/// A single socket event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketEvent {
    Read,
    Write,
    Accept,
    Connect,
}

impl SocketEvent {
    /// Order in which per-event handlers are called for one readiness batch
    pub const DISPATCH_ORDER: [SocketEvent; 4] = [
        SocketEvent::Read,
        SocketEvent::Write,
        SocketEvent::Accept,
        SocketEvent::Connect,
    ];

    /// Single-element event set
    pub fn as_set(self) -> EventSet {
        match self {
            SocketEvent::Read => EventSet::READ,
            SocketEvent::Write => EventSet::WRITE,
            SocketEvent::Accept => EventSet::ACCEPT,
            SocketEvent::Connect => EventSet::CONNECT,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SocketEvent::Read => 0,
            SocketEvent::Write => 1,
            SocketEvent::Accept => 2,
            SocketEvent::Connect => 3,
        }
    }
}

impl From<SocketEvent> for EventSet {
    fn from(event: SocketEvent) -> Self {
        event.as_set()
    }
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketEvent::Read => "read",
            SocketEvent::Write => "write",
            SocketEvent::Accept => "accept",
            SocketEvent::Connect => "connect",
        };
        f.write_str(name)
    }
}
