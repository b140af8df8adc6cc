//! Readiness Backend (POSIX)

use std::os::unix::io::AsRawFd;

use adapters_reactor::{Reactor, ReactorError, Readiness, Registration};
use socket2::Socket as Socket2;

use super::EventBackend;
use crate::error::{classify_connect_result, SocketError};
use crate::event::EventSet;
use crate::socket::{EventSink, SocketState};

pub(crate) struct ReadinessBackend {
    registration: Registration,
}

impl EventBackend for ReadinessBackend {
    fn attach(reactor: &dyn Reactor, socket: &Socket2, sink: EventSink) -> Result<Self, ReactorError> {
        let registration = reactor.add_file_descriptor(
            socket.as_raw_fd(),
            Box::new(move |ready| sink.deliver(|state| on_ready(state, ready))),
        )?;
        Ok(Self { registration })
    }

    fn update(&self, reactor: &dyn Reactor, _socket: &Socket2, events: EventSet) {
        reactor.set_file_descriptor_events(self.registration, interest(events));
    }

    fn detach(self, reactor: &dyn Reactor) {
        reactor.remove_file_descriptor(self.registration);
    }
}

/// Reactor interest for a set of enabled events
pub(crate) fn interest(events: EventSet) -> Readiness {
    let mut interest = Readiness::empty();
    if events.intersects(EventSet::READ | EventSet::ACCEPT) {
        interest |= Readiness::READ;
    }
    if events.intersects(EventSet::WRITE | EventSet::CONNECT) {
        interest |= Readiness::WRITE;
    }
    interest
}

/// Socket events reported by a readiness notification
pub(crate) fn translate(enabled: EventSet, ready: Readiness) -> EventSet {
    let mut events = EventSet::empty();
    if ready.contains(Readiness::READ) {
        events |= enabled & (EventSet::READ | EventSet::ACCEPT);
    }
    if ready.contains(Readiness::WRITE) {
        events |= enabled & (EventSet::WRITE | EventSet::CONNECT);
    }
    events
}

fn on_ready(state: &mut SocketState, ready: Readiness) -> EventSet {
    let events = translate(state.wait_events, ready);
    if events.contains(EventSet::CONNECT) {
        state.resolve_connect(connect_outcome);
    }
    events
}

fn connect_outcome(socket: &Socket2) -> Result<(), SocketError> {
    match socket.take_error() {
        Ok(None) => Ok(()),
        Ok(Some(err)) => classify_connect_result(err.raw_os_error().unwrap_or(-1)),
        Err(err) => panic!("reading the pending socket error failed: {err}"),
    }
}
