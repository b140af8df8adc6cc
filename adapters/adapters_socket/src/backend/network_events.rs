//! Network Event Backend (Windows)
//!
//! The socket is associated with an event object through `WSAEventSelect`.
//! When the reactor reports the object signalled, `WSAEnumNetworkEvents`
//! returns the fired network events and the per-event error codes. A close
//! notification is reported as both READ and WRITE so the owner discovers it
//! through its next operation.
//!
//! The mask tables are plain functions so they can be exercised on any host.

pub(crate) const FD_READ: i32 = 1 << 0;
pub(crate) const FD_WRITE: i32 = 1 << 1;
pub(crate) const FD_ACCEPT: i32 = 1 << 3;
pub(crate) const FD_CONNECT: i32 = 1 << 4;
pub(crate) const FD_CLOSE: i32 = 1 << 5;
pub(crate) const FD_CONNECT_BIT: usize = 4;

use crate::event::EventSet;

/// Network events fired since the last enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NetworkEvents {
    pub(crate) fired: i32,
    pub(crate) connect_error: i32,
}

/// `WSAEventSelect` mask for a set of enabled events
pub(crate) fn select_mask(events: EventSet) -> i32 {
    let mut mask = 0;
    if events.contains(EventSet::READ) {
        mask |= FD_READ | FD_CLOSE;
    }
    if events.contains(EventSet::WRITE) {
        mask |= FD_WRITE | FD_CLOSE;
    }
    if events.contains(EventSet::ACCEPT) {
        mask |= FD_ACCEPT;
    }
    if events.contains(EventSet::CONNECT) {
        mask |= FD_CONNECT;
    }
    mask
}

/// Socket events reported by an enumeration
pub(crate) fn translate(enabled: EventSet, network: NetworkEvents) -> EventSet {
    let fired = network.fired;
    let mut events = EventSet::empty();
    if fired & (FD_READ | FD_CLOSE) != 0 {
        events |= EventSet::READ;
    }
    if fired & (FD_WRITE | FD_CLOSE) != 0 {
        events |= EventSet::WRITE;
    }
    if fired & FD_ACCEPT != 0 {
        events |= EventSet::ACCEPT;
    }
    if fired & FD_CONNECT != 0 {
        events |= EventSet::CONNECT;
    }
    events & enabled
}

#[cfg(windows)]
pub(crate) use self::imp::NetworkEventBackend;

#[cfg(windows)]
mod imp {
    use std::io;
    use std::os::windows::io::{AsRawSocket, RawHandle};

    use adapters_reactor::{Reactor, ReactorError, Registration};
    use socket2::Socket as Socket2;
    use windows_sys::Win32::Networking::WinSock::{
        WSACloseEvent, WSACreateEvent, WSAEnumNetworkEvents, WSAEventSelect, WSAGetLastError,
        SOCKET, WSANETWORKEVENTS,
    };

    use super::{select_mask, translate, NetworkEvents, FD_CONNECT_BIT};
    use crate::backend::EventBackend;
    use crate::error::classify_connect_result;
    use crate::event::EventSet;
    use crate::socket::{EventSink, SocketState};

    type EventObject = isize;

    pub(crate) struct NetworkEventBackend {
        event: EventObject,
        registration: Registration,
    }

    impl EventBackend for NetworkEventBackend {
        fn attach(reactor: &dyn Reactor, _socket: &Socket2, sink: EventSink) -> Result<Self, ReactorError> {
            // SAFETY: WSACreateEvent has no preconditions.
            let event = unsafe { WSACreateEvent() } as EventObject;
            if event == 0 {
                return Err(ReactorError::Io(last_wsa_error()));
            }

            let handler = Box::new(move || sink.deliver(|state| on_signal(state, event)));
            let registration = match reactor.add_handle(event as RawHandle, handler) {
                Ok(registration) => registration,
                Err(err) => {
                    // SAFETY: the event object was created above and is not shared.
                    unsafe { WSACloseEvent(event as _) };
                    return Err(err);
                }
            };
            reactor.enable_handle(registration);
            Ok(Self { event, registration })
        }

        fn update(&self, _reactor: &dyn Reactor, socket: &Socket2, events: EventSet) {
            let raw = socket.as_raw_socket() as SOCKET;
            // SAFETY: both handles are owned and open for the lifetime of the socket.
            let rc = unsafe { WSAEventSelect(raw, self.event as _, select_mask(events)) };
            if rc != 0 {
                panic!("WSAEventSelect failed: {}", last_wsa_error());
            }
        }

        fn detach(self, reactor: &dyn Reactor) {
            reactor.remove_handle(self.registration);
            // SAFETY: the reactor no longer references the event object.
            unsafe { WSACloseEvent(self.event as _) };
        }
    }

    fn on_signal(state: &mut SocketState, event: EventObject) -> EventSet {
        let raw = state.socket().as_raw_socket() as SOCKET;
        // SAFETY: WSANETWORKEVENTS is plain data.
        let mut network: WSANETWORKEVENTS = unsafe { std::mem::zeroed() };
        // SAFETY: socket and event object are open; `network` is a valid out pointer.
        let rc = unsafe { WSAEnumNetworkEvents(raw, event as _, &mut network) };
        if rc != 0 {
            panic!("WSAEnumNetworkEvents failed: {}", last_wsa_error());
        }

        let network = NetworkEvents {
            fired: network.lNetworkEvents,
            connect_error: network.iErrorCode[FD_CONNECT_BIT],
        };
        let events = translate(state.wait_events, network);
        if events.contains(EventSet::CONNECT) {
            state.resolve_connect(|_| classify_connect_result(network.connect_error));
        }
        events
    }

    fn last_wsa_error() -> io::Error {
        // SAFETY: WSAGetLastError has no preconditions.
        io::Error::from_raw_os_error(unsafe { WSAGetLastError() })
    }
}
