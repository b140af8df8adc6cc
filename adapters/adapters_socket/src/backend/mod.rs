//! Event Backend Module
//!
//! Connects a socket to the reactor and translates native readiness into
//! socket events.
//!
//! Two variants exist. The readiness variant (POSIX) registers the descriptor
//! and maps READ/ACCEPT to readability and WRITE/CONNECT to writability. The
//! network-event variant (Windows) associates an event object with the socket
//! and, when it is signalled, asks the socket which network events fired. Both
//! read the deferred connect error when CONNECT is reported and store the
//! outcome on the socket before the event reaches any handler.

#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) mod network_events;
#[cfg(unix)]
pub(crate) mod readiness;

use adapters_reactor::{Reactor, ReactorError};
use socket2::Socket as Socket2;

use crate::event::EventSet;
use crate::socket::EventSink;

/// Platform event backend of one socket
pub(crate) trait EventBackend: Sized {
    /// Register the socket with the reactor with an empty subscription
    fn attach(reactor: &dyn Reactor, socket: &Socket2, sink: EventSink) -> Result<Self, ReactorError>;

    /// Push the enabled event set to the reactor
    fn update(&self, reactor: &dyn Reactor, socket: &Socket2, events: EventSet);

    /// Remove the registration and release native resources
    fn detach(self, reactor: &dyn Reactor);
}

#[cfg(unix)]
pub(crate) type PlatformBackend = readiness::ReadinessBackend;

#[cfg(windows)]
pub(crate) type PlatformBackend = network_events::NetworkEventBackend;
