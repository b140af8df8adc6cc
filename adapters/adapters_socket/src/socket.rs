//! Socket Module
//!
//! Event-driven non-blocking sockets bound to a single-threaded reactor.
//!
//! A [`Socket`] owns one native handle and one reactor registration. Every
//! operation is non-blocking and reports its outcome both as a return value
//! and as the socket's stored last error. Readiness is delivered to handlers:
//! either one global handler that receives the whole ready set, or one handler
//! per event kind. Handlers may call any method on any socket, and may free the
//! socket they were called for.
//!
//! ## Connect
//!
//! A non-blocking connect that cannot complete immediately returns
//! [`SocketError::InProgress`] and leaves the socket `Pending`. The CONNECT
//! event fires once the OS has decided; by then the outcome is stored and
//! [`Socket::connect_result`] returns it and resets the socket to `Idle`.
//!
//! ## Fairness
//!
//! Each readiness dispatch resets a per-socket receive counter. Once the
//! counter reaches the configured [`RecvLimit`], receive calls report
//! [`SocketError::Later`] until the next dispatch, even if data is pending.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Read};
use std::mem::{self, MaybeUninit};
use std::rc::{Rc, Weak};

use adapters_reactor::Reactor;
use entities_net_address::{Addr, AddrFamily, IpAddress};
use socket2::{Socket as Socket2, Type};
use tracing::{debug, trace, warn};

use crate::addr::{self, domain_of};
use crate::backend::{EventBackend, PlatformBackend};
use crate::config::{RecvLimit, SocketConfig};
use crate::dispatch::{self, InstanceId};
use crate::error::{classify_io, Operation, SocketError};
use crate::event::{EventSet, SocketEvent};
use crate::handlers::Handlers;
use crate::sys;

/// Socket class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketClass {
    /// Connection-oriented byte stream (TCP)
    Stream,
    /// Connectionless datagrams (UDP)
    Datagram,
}

impl From<SocketClass> for Type {
    fn from(class: SocketClass) -> Self {
        match class {
            SocketClass::Stream => Type::STREAM,
            SocketClass::Datagram => Type::DGRAM,
        }
    }
}

/// State of the connect state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    /// No connect outstanding
    Idle,
    /// Connect started; waiting for the OS
    Pending,
    /// Outcome known; waiting for [`Socket::connect_result`]
    Resolved(Result<(), SocketError>),
}

/// A datagram received with [`Socket::recv_from_to`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram {
    /// Bytes received
    pub len: usize,
    /// Sender address
    pub remote: Addr,
    /// Local address the datagram was sent to, if known
    pub local: IpAddress,
    /// Whether the packet-info path was used
    pub via_pktinfo: bool,
}

pub(crate) struct SocketState {
    id: InstanceId,
    reactor: Rc<dyn Reactor>,
    socket: Socket2,
    family: AddrFamily,
    class: SocketClass,
    have_pktinfo: bool,
    config: SocketConfig,
    error: Option<SocketError>,
    pub(crate) handlers: Handlers,
    pub(crate) wait_events: EventSet,
    connect: ConnectState,
    recv_limit: RecvLimit,
    recv_num: u32,
    backend: Option<PlatformBackend>,
}

impl SocketState {
    #[cfg_attr(not(windows), allow(dead_code))]
    pub(crate) fn socket(&self) -> &Socket2 {
        &self.socket
    }

    /// Store the connect outcome when CONNECT readiness is reported
    ///
    /// A resolved outcome that has not been collected yet is kept as is.
    pub(crate) fn resolve_connect(
        &mut self,
        outcome: impl FnOnce(&Socket2) -> Result<(), SocketError>,
    ) {
        match self.connect {
            ConnectState::Pending => {
                let result = outcome(&self.socket);
                debug!(id = self.id.get(), ?result, "connect resolved");
                self.connect = ConnectState::Resolved(result);
            }
            ConnectState::Resolved(_) => {}
            ConnectState::Idle => panic!("connect readiness reported without a pending connect"),
        }
    }

    fn complete<T>(&mut self, op: Operation, result: io::Result<T>) -> Result<T, SocketError> {
        match result {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(err) => {
                let error = classify_io(op, self.class, &err);
                self.error = Some(error);
                Err(error)
            }
        }
    }

    fn take_recv_slot(&mut self) -> Result<(), SocketError> {
        if self.recv_limit.is_reached(self.recv_num) {
            self.error = Some(SocketError::Later);
            return Err(SocketError::Later);
        }
        self.recv_num = self.recv_num.saturating_add(1);
        Ok(())
    }

    fn recv_from_native(&mut self, buf: &mut [u8]) -> Result<(usize, Addr), SocketError> {
        // SAFETY: recv_from only writes initialised bytes and never reads the buffer.
        let uninit = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
        let result = self.socket.recv_from(uninit);
        let (len, from) = self.complete(Operation::Recv, result)?;
        Ok((len, addr::from_native(&from)))
    }

    fn push_events(&self) {
        if let Some(backend) = &self.backend {
            backend.update(&*self.reactor, &self.socket, self.wait_events);
        }
    }
}

/// Entry point from the event backend into a socket
///
/// Holds only a weak reference, so a registration never keeps a freed socket
/// alive.
pub(crate) struct EventSink {
    state: Weak<RefCell<SocketState>>,
    id: InstanceId,
}

impl EventSink {
    /// Translate native readiness and dispatch the resulting events
    pub(crate) fn deliver(&self, translate: impl FnOnce(&mut SocketState) -> EventSet) {
        if !dispatch::is_live(self.id) {
            return;
        }
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let events = {
            let mut state = state.borrow_mut();
            state.recv_num = 0;
            translate(&mut *state)
        };
        drop(state);

        trace!(id = self.id.get(), ?events, "readiness");
        dispatch::dispatch(&self.state, self.id, events);
    }
}

/// Event-driven non-blocking socket
pub struct Socket {
    state: Rc<RefCell<SocketState>>,
    id: InstanceId,
}

impl Socket {
    /// Open a socket with default configuration
    ///
    /// # Arguments
    ///
    /// * `reactor` - Reactor the socket registers with for its whole life
    /// * `family` - Address family
    /// * `class` - Stream or datagram
    ///
    /// # Returns
    ///
    /// * `Ok(Socket)` - Non-blocking socket registered with an empty subscription
    /// * `Err(SocketError::Unknown)` - Creation, setup or registration failed
    pub fn open(
        reactor: &Rc<dyn Reactor>,
        family: AddrFamily,
        class: SocketClass,
    ) -> Result<Socket, SocketError> {
        Self::open_with_config(reactor, family, class, SocketConfig::default())
    }

    /// Open a socket with custom configuration
    ///
    /// Datagram sockets try to enable packet info unless the configuration
    /// disables it. Failure to enable it is not an error: the socket falls
    /// back to plain datagram I/O and [`Socket::has_pktinfo`] reports `false`.
    pub fn open_with_config(
        reactor: &Rc<dyn Reactor>,
        family: AddrFamily,
        class: SocketClass,
        config: SocketConfig,
    ) -> Result<Socket, SocketError> {
        let socket = Socket2::new(domain_of(family), class.into(), None).map_err(|err| {
            debug!(%err, %family, ?class, "socket creation failed");
            SocketError::Unknown
        })?;
        if let Err(err) = socket.set_nonblocking(true).and_then(|()| sys::prepare(&socket)) {
            debug!(%err, %family, ?class, "socket setup failed");
            return Err(SocketError::Unknown);
        }

        let want_pktinfo = class == SocketClass::Datagram && config.packet_info;
        let have_pktinfo = want_pktinfo && sys::enable_pktinfo(&socket, family);

        let socket = Self::adopt(reactor.clone(), socket, family, class, have_pktinfo, config)?;
        if want_pktinfo && !have_pktinfo {
            warn!(
                id = socket.id.get(),
                "no packet info; datagram local addresses will not be reported"
            );
        }
        Ok(socket)
    }

    /// Wrap a configured native socket and register it with the reactor
    fn adopt(
        reactor: Rc<dyn Reactor>,
        socket: Socket2,
        family: AddrFamily,
        class: SocketClass,
        have_pktinfo: bool,
        config: SocketConfig,
    ) -> Result<Socket, SocketError> {
        let id = dispatch::register();
        let state = Rc::new(RefCell::new(SocketState {
            id,
            reactor,
            socket,
            family,
            class,
            have_pktinfo,
            recv_limit: config.recv_limit,
            config,
            error: None,
            handlers: Handlers::Empty,
            wait_events: EventSet::empty(),
            connect: ConnectState::Idle,
            recv_num: 0,
            backend: None,
        }));

        let sink = EventSink {
            state: Rc::downgrade(&state),
            id,
        };
        let attached = {
            let st = state.borrow();
            PlatformBackend::attach(&*st.reactor, &st.socket, sink)
        };
        match attached {
            Ok(backend) => {
                let mut st = state.borrow_mut();
                backend.update(&*st.reactor, &st.socket, EventSet::empty());
                st.backend = Some(backend);
            }
            Err(err) => {
                dispatch::retire(id);
                warn!(id = id.get(), %err, "reactor registration failed");
                return Err(SocketError::Unknown);
            }
        }

        debug!(id = id.get(), %family, ?class, pktinfo = have_pktinfo, "socket opened");
        Ok(Socket { state, id })
    }

    /// Close the socket
    ///
    /// Equivalent to dropping it: the reactor registration is removed, the
    /// handle is closed and any dispatch in progress for this socket stops
    /// after the current handler returns.
    pub fn free(self) {
        drop(self);
    }

    /// Process-unique identity of this socket
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Address family
    pub fn family(&self) -> AddrFamily {
        self.state.borrow().family
    }

    /// Socket class
    pub fn class(&self) -> SocketClass {
        self.state.borrow().class
    }

    /// Whether datagram local addresses can be recovered through packet info
    pub fn has_pktinfo(&self) -> bool {
        self.state.borrow().have_pktinfo
    }

    /// Outcome of the most recent operation; `None` means success
    pub fn last_error(&self) -> Option<SocketError> {
        self.state.borrow().error
    }

    /// Events currently enabled
    pub fn enabled_events(&self) -> EventSet {
        self.state.borrow().wait_events
    }

    /// Current connect state
    pub fn connect_state(&self) -> ConnectState {
        self.state.borrow().connect
    }

    /// Replace the per-dispatch receive limit and reset the receive counter
    pub fn set_recv_max(&self, limit: impl Into<RecvLimit>) {
        let mut st = self.state.borrow_mut();
        st.recv_limit = limit.into();
        st.recv_num = 0;
    }

    /// Bind to a local address
    ///
    /// Stream sockets enable address reuse first (best effort).
    ///
    /// # Errors
    ///
    /// `AddressNotAvailable`, `AddressInUse`, `AccessDenied` or `Unknown`.
    pub fn bind(&self, addr: &Addr) -> Result<(), SocketError> {
        let native = addr::to_native(addr);
        let mut st = self.state.borrow_mut();

        if st.class == SocketClass::Stream && st.config.reuse_address {
            if let Err(err) = st.socket.set_reuse_address(true) {
                warn!(id = st.id.get(), %err, "failed to enable address reuse");
            }
        }

        let result = st.socket.bind(&native);
        st.complete(Operation::Bind, result)
    }

    /// Start listening; a non-positive backlog selects the configured default
    pub fn listen(&self, backlog: i32) -> Result<(), SocketError> {
        let mut st = self.state.borrow_mut();
        let backlog = if backlog <= 0 { st.config.backlog } else { backlog };
        let result = st.socket.listen(backlog);
        st.complete(Operation::Listen, result)
    }

    /// Start connecting to a remote address
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Connected immediately; the connect state stays `Idle`
    /// * `Err(SocketError::InProgress)` - The socket is now `Pending`; wait for CONNECT
    /// * `Err(SocketError::Unknown)` - Any other failure
    ///
    /// # Panics
    ///
    /// Panics unless the connect state is `Idle`.
    pub fn connect(&self, addr: &Addr) -> Result<(), SocketError> {
        let native = addr::to_native(addr);
        let mut st = self.state.borrow_mut();
        assert!(
            st.connect == ConnectState::Idle,
            "connect requested while a previous connect is {:?}",
            st.connect
        );

        let result = st.socket.connect(&native);
        let outcome = st.complete(Operation::Connect, result);
        if outcome == Err(SocketError::InProgress) {
            st.connect = ConnectState::Pending;
        }
        outcome
    }

    /// Collect the outcome of a completed connect and reset to `Idle`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Connected
    /// * `Err(SocketError::ConnectionRefused | ConnectionTimedOut | Unknown)` - Failed
    ///
    /// # Panics
    ///
    /// Panics unless the connect state is `Resolved`, i.e. unless CONNECT has
    /// been reported since the connect was started.
    pub fn connect_result(&self) -> Result<(), SocketError> {
        let mut st = self.state.borrow_mut();
        let ConnectState::Resolved(result) = st.connect else {
            panic!("connect result requested while connect is {:?}", st.connect);
        };
        st.connect = ConnectState::Idle;
        st.error = result.err();
        result
    }

    fn accept_native(&self) -> Result<(Socket2, Addr), SocketError> {
        let mut st = self.state.borrow_mut();
        let result = st.socket.accept();
        let (socket, peer) = st.complete(Operation::Accept, result)?;
        Ok((socket, addr::from_native(&peer)))
    }

    fn record(&self, error: SocketError) -> SocketError {
        self.state.borrow_mut().error = Some(error);
        error
    }

    /// Accept a pending connection
    ///
    /// The new socket is non-blocking, registered with the same reactor with an
    /// empty subscription, has no packet info, and inherits this socket's
    /// configuration (including its configured receive limit).
    ///
    /// # Errors
    ///
    /// `Later` when no connection is pending, `Unknown` otherwise.
    pub fn accept(&self) -> Result<(Socket, Addr), SocketError> {
        let (native, peer) = self.accept_native()?;
        let (reactor, family, class, config) = {
            let st = self.state.borrow();
            (st.reactor.clone(), st.family, st.class, st.config.clone())
        };

        if let Err(err) = native.set_nonblocking(true).and_then(|()| sys::prepare(&native)) {
            warn!(id = self.id.get(), %err, "failed to configure accepted socket");
            return Err(self.record(SocketError::Unknown));
        }

        match Socket::adopt(reactor, native, family, class, false, config) {
            Ok(socket) => {
                debug!(id = self.id.get(), accepted = socket.id.get(), %peer, "connection accepted");
                Ok((socket, peer))
            }
            Err(error) => Err(self.record(error)),
        }
    }

    /// Accept a pending connection and close it immediately
    ///
    /// Used to drain the backlog without keeping the connection.
    pub fn drain_accept(&self) -> Result<Addr, SocketError> {
        let (native, peer) = self.accept_native()?;
        drop(native);
        trace!(id = self.id.get(), %peer, "accepted connection discarded");
        Ok(peer)
    }

    /// Send on a connected socket
    ///
    /// # Errors
    ///
    /// `Later`, `ConnectionRefused`, `ConnectionReset` (datagram: `ConnectionRefused`) or `Unknown`.
    pub fn send(&self, buf: &[u8]) -> Result<usize, SocketError> {
        let mut st = self.state.borrow_mut();
        let result = st.socket.send_with_flags(buf, sys::SEND_FLAGS);
        st.complete(Operation::Send, result)
    }

    /// Receive on a connected socket
    ///
    /// Subject to the per-dispatch receive limit. A stream returning `Ok(0)`
    /// for a non-empty buffer has reached end of stream.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        let mut st = self.state.borrow_mut();
        st.take_recv_slot()?;
        let result = (&st.socket).read(buf);
        st.complete(Operation::Recv, result)
    }

    /// Send a datagram to an address
    pub fn send_to(&self, buf: &[u8], addr: &Addr) -> Result<usize, SocketError> {
        let native = addr::to_native(addr);
        let mut st = self.state.borrow_mut();
        let result = st.socket.send_to_with_flags(buf, &native, sys::SEND_FLAGS);
        st.complete(Operation::Send, result)
    }

    /// Receive a datagram and its sender address
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, Addr), SocketError> {
        let mut st = self.state.borrow_mut();
        st.take_recv_slot()?;
        st.recv_from_native(buf)
    }

    /// Send a datagram with an explicit local source address
    ///
    /// An invalid `local` sends without a source override. Without packet
    /// info this is exactly [`Socket::send_to`] and `local` is ignored.
    pub fn send_to_from(
        &self,
        buf: &[u8],
        remote: &Addr,
        local: &IpAddress,
    ) -> Result<usize, SocketError> {
        let native = addr::to_native(remote);
        let mut st = self.state.borrow_mut();

        if st.have_pktinfo {
            if let Some(result) = sys::send_msg_from(&st.socket, buf, &native, local) {
                return st.complete(Operation::Send, result);
            }
            trace!(id = st.id.get(), "packet info send unavailable; falling back");
        }

        let result = st.socket.send_to_with_flags(buf, &native, sys::SEND_FLAGS);
        st.complete(Operation::Send, result)
    }

    /// Receive a datagram with its sender and local destination address
    ///
    /// Without packet info this is exactly [`Socket::recv_from`], and the
    /// returned [`Datagram`] has an invalid local address and
    /// `via_pktinfo == false`.
    pub fn recv_from_to(&self, buf: &mut [u8]) -> Result<Datagram, SocketError> {
        let mut st = self.state.borrow_mut();
        st.take_recv_slot()?;

        if st.have_pktinfo {
            if let Some(result) = sys::recv_msg_to(&st.socket, buf) {
                let (len, from, local) = st.complete(Operation::Recv, result)?;
                return Ok(Datagram {
                    len,
                    remote: addr::from_native(&from),
                    local,
                    via_pktinfo: true,
                });
            }
            trace!(id = st.id.get(), "packet info receive unavailable; falling back");
        }

        let (len, remote) = st.recv_from_native(buf)?;
        Ok(Datagram {
            len,
            remote,
            local: IpAddress::Invalid,
            via_pktinfo: false,
        })
    }

    /// Address of the connected peer; `Unknown` on any failure
    pub fn peer_addr(&self) -> Result<Addr, SocketError> {
        let mut st = self.state.borrow_mut();
        let result = st.socket.peer_addr();
        let native = st.complete(Operation::AddressQuery, result)?;
        Ok(addr::from_native(&native))
    }

    /// Bound local address; `Unknown` on any failure
    pub fn local_addr(&self) -> Result<Addr, SocketError> {
        let mut st = self.state.borrow_mut();
        let result = st.socket.local_addr();
        let native = st.complete(Operation::AddressQuery, result)?;
        Ok(addr::from_native(&native))
    }

    /// Install the global handler
    ///
    /// # Panics
    ///
    /// Panics if any handler is installed.
    pub fn add_global_handler(&self, handler: impl FnMut(EventSet) + 'static) {
        self.state
            .borrow_mut()
            .handlers
            .install_global(Rc::new(RefCell::new(handler)));
    }

    /// Remove the global handler and clear the enabled events
    pub fn remove_global_handler(&self) {
        let mut st = self.state.borrow_mut();
        st.handlers.remove_global();
        st.wait_events = EventSet::empty();
        st.push_events();
    }

    /// Replace the events delivered to the global handler
    ///
    /// # Panics
    ///
    /// Panics without a global handler, or if `events` mixes socket roles.
    pub fn set_global_events(&self, events: EventSet) {
        let mut st = self.state.borrow_mut();
        assert!(st.handlers.is_global(), "global events require a global handler");
        assert!(events.is_coherent(), "event set {events:?} mixes socket roles");
        st.wait_events = events;
        st.push_events();
    }

    /// Install the handler for one event; the event stays disabled
    ///
    /// # Panics
    ///
    /// Panics if a global handler or a handler for this event is installed.
    pub fn add_event_handler(&self, event: SocketEvent, handler: impl FnMut(SocketEvent) + 'static) {
        self.state
            .borrow_mut()
            .handlers
            .install(event, Rc::new(RefCell::new(handler)));
    }

    /// Remove the handler for one event, disabling the event first
    pub fn remove_event_handler(&self, event: SocketEvent) {
        let mut st = self.state.borrow_mut();
        st.handlers.remove(event);
        if st.wait_events.contains(event.as_set()) {
            st.wait_events.remove(event.as_set());
            st.push_events();
        }
    }

    /// Start delivering an event to its handler
    ///
    /// # Panics
    ///
    /// Panics without a handler for the event, if the event is already
    /// enabled, or if enabling it would mix socket roles (READ/WRITE vs
    /// ACCEPT vs CONNECT).
    pub fn enable_event(&self, event: SocketEvent) {
        let mut st = self.state.borrow_mut();
        assert!(st.handlers.has(event), "enabling {event} requires a {event} handler");
        assert!(!st.wait_events.contains(event.as_set()), "{event} is already enabled");

        let events = st.wait_events | event.as_set();
        assert!(
            events.is_coherent(),
            "enabling {event} conflicts with enabled events {:?}",
            st.wait_events
        );
        st.wait_events = events;
        st.push_events();
    }

    /// Stop delivering an event
    ///
    /// # Panics
    ///
    /// Panics without a handler for the event or if it is not enabled.
    pub fn disable_event(&self, event: SocketEvent) {
        let mut st = self.state.borrow_mut();
        assert!(st.handlers.has(event), "disabling {event} requires a {event} handler");
        assert!(st.wait_events.contains(event.as_set()), "{event} is not enabled");
        st.wait_events.remove(event.as_set());
        st.push_events();
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        dispatch::retire(self.id);
        let (backend, reactor, handlers) = {
            let mut st = self.state.borrow_mut();
            st.wait_events = EventSet::empty();
            (st.backend.take(), st.reactor.clone(), mem::take(&mut st.handlers))
        };
        if let Some(backend) = backend {
            backend.detach(&*reactor);
        }
        drop(handlers);
        debug!(id = self.id.get(), "socket freed");
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Socket");
        debug.field("id", &self.id.get());
        if let Ok(st) = self.state.try_borrow() {
            debug
                .field("family", &st.family)
                .field("class", &st.class)
                .field("events", &st.wait_events)
                .field("connect", &st.connect);
        }
        debug.finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::MockHarness;
    use adapters_reactor::{PollReactor, Readiness};
    use std::cell::Cell;
    use std::net::Ipv4Addr;

    fn poll_reactor() -> Rc<dyn Reactor> {
        Rc::new(PollReactor::new())
    }

    fn loopback() -> Addr {
        Addr::ipv4(Ipv4Addr::LOCALHOST, 0)
    }

    #[test]
    fn test_open_registers_with_empty_interest() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        assert_eq!(harness.pushes(), vec![Readiness::empty()]);
        assert_eq!(socket.enabled_events(), EventSet::empty());
        assert_eq!(socket.connect_state(), ConnectState::Idle);
        assert_eq!(socket.last_error(), None);
        assert!(!socket.has_pktinfo());

        socket.free();
        assert!(harness.removed.get());
    }

    #[test]
    fn test_subscription_pushes() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_event_handler(SocketEvent::Read, |_| {});
        socket.add_event_handler(SocketEvent::Write, |_| {});

        socket.enable_event(SocketEvent::Read);
        socket.enable_event(SocketEvent::Write);
        socket.disable_event(SocketEvent::Read);
        socket.remove_event_handler(SocketEvent::Write);

        assert_eq!(
            harness.pushes(),
            vec![
                Readiness::empty(),
                Readiness::READ,
                Readiness::READ | Readiness::WRITE,
                Readiness::WRITE,
                Readiness::empty(),
            ]
        );
        assert_eq!(socket.enabled_events(), EventSet::empty());
    }

    #[test]
    fn test_accept_and_connect_interest() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_event_handler(SocketEvent::Accept, |_| {});
        socket.add_event_handler(SocketEvent::Connect, |_| {});

        socket.enable_event(SocketEvent::Accept);
        socket.disable_event(SocketEvent::Accept);
        socket.enable_event(SocketEvent::Connect);

        assert_eq!(
            harness.pushes(),
            vec![Readiness::empty(), Readiness::READ, Readiness::empty(), Readiness::WRITE]
        );
    }

    #[test]
    fn test_remove_global_handler_clears_subscription() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_global_handler(|_| {});
        socket.set_global_events(EventSet::READ | EventSet::WRITE);
        socket.remove_global_handler();

        assert_eq!(
            harness.pushes(),
            vec![
                Readiness::empty(),
                Readiness::READ | Readiness::WRITE,
                Readiness::empty()
            ]
        );
        assert_eq!(socket.enabled_events(), EventSet::empty());
        socket.add_event_handler(SocketEvent::Read, |_| {});
    }

    #[test]
    fn test_dispatch_order() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));
        for event in [SocketEvent::Write, SocketEvent::Read] {
            let order = order.clone();
            socket.add_event_handler(event, move |fired| order.borrow_mut().push(fired));
            socket.enable_event(event);
        }

        harness.fire(Readiness::READ | Readiness::WRITE);
        assert_eq!(*order.borrow(), vec![SocketEvent::Read, SocketEvent::Write]);

        harness.fire(Readiness::WRITE);
        assert_eq!(order.borrow().last(), Some(&SocketEvent::Write));
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn test_global_handler_receives_full_set() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        socket.add_global_handler(move |events| sink.borrow_mut().push(events));
        socket.set_global_events(EventSet::READ | EventSet::WRITE);

        harness.fire(Readiness::READ | Readiness::WRITE);
        harness.fire(Readiness::READ);
        assert_eq!(
            *seen.borrow(),
            vec![EventSet::READ | EventSet::WRITE, EventSet::READ]
        );
    }

    #[test]
    fn test_free_in_handler_stops_batch() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        let id = socket.id();
        let slot = Rc::new(RefCell::new(None::<Socket>));
        let writes = Rc::new(Cell::new(0));

        let owner = slot.clone();
        socket.add_event_handler(SocketEvent::Read, move |_| {
            let freed = owner.borrow_mut().take();
            drop(freed);
        });
        let counter = writes.clone();
        socket.add_event_handler(SocketEvent::Write, move |_| counter.set(counter.get() + 1));
        socket.enable_event(SocketEvent::Read);
        socket.enable_event(SocketEvent::Write);
        *slot.borrow_mut() = Some(socket);

        harness.fire(Readiness::READ | Readiness::WRITE);

        assert_eq!(writes.get(), 0);
        assert!(harness.removed.get());
        assert!(!dispatch::is_live(id));

        // A stale readiness callback for the freed socket is ignored.
        harness.fire(Readiness::READ | Readiness::WRITE);
        assert_eq!(writes.get(), 0);
    }

    #[test]
    fn test_handler_disabling_later_event_skips_it() {
        let harness = MockHarness::new();
        let socket = Rc::new(
            Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap(),
        );
        let writes = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&socket);
        socket.add_event_handler(SocketEvent::Read, move |_| {
            if let Some(socket) = weak.upgrade() {
                socket.disable_event(SocketEvent::Write);
            }
        });
        let counter = writes.clone();
        socket.add_event_handler(SocketEvent::Write, move |_| counter.set(counter.get() + 1));
        socket.enable_event(SocketEvent::Read);
        socket.enable_event(SocketEvent::Write);

        harness.fire(Readiness::READ | Readiness::WRITE);
        assert_eq!(writes.get(), 0);
        assert_eq!(socket.enabled_events(), EventSet::READ);
    }

    #[test]
    fn test_recv_counter_reset_per_dispatch() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Datagram).unwrap();
        socket.bind(&loopback()).unwrap();
        socket.add_event_handler(SocketEvent::Read, |_| {});
        socket.enable_event(SocketEvent::Read);

        let mut buf = [0u8; 8];
        assert_eq!(socket.recv(&mut buf), Err(SocketError::Later));
        assert_eq!(socket.recv(&mut buf), Err(SocketError::Later));
        // Exhausted: reported without asking the OS.
        assert_eq!(socket.recv(&mut buf), Err(SocketError::Later));
        assert_eq!(socket.state.borrow().recv_num, 2);

        harness.fire(Readiness::READ);
        assert_eq!(socket.state.borrow().recv_num, 0);
    }

    #[test]
    fn test_set_recv_max_resets_counter() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Datagram).unwrap();
        socket.bind(&loopback()).unwrap();
        let mut buf = [0u8; 8];
        socket.set_recv_max(1);
        assert_eq!(socket.recv(&mut buf), Err(SocketError::Later));
        assert_eq!(socket.state.borrow().recv_num, 1);

        socket.set_recv_max(RecvLimit::Unlimited);
        assert_eq!(socket.state.borrow().recv_num, 0);
        for _ in 0..10 {
            assert_eq!(socket.recv(&mut buf), Err(SocketError::Later));
        }
    }

    #[test]
    fn test_connect_readiness_redelivered_while_resolved() {
        let harness = MockHarness::new();
        let socket = Socket::open(&harness.reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        socket.add_event_handler(SocketEvent::Connect, move |_| counter.set(counter.get() + 1));
        socket.enable_event(SocketEvent::Connect);

        socket.state.borrow_mut().connect = ConnectState::Resolved(Err(SocketError::ConnectionRefused));
        harness.fire(Readiness::WRITE);
        harness.fire(Readiness::WRITE);
        assert_eq!(fired.get(), 2);
        assert_eq!(socket.connect_result(), Err(SocketError::ConnectionRefused));
        assert_eq!(socket.last_error(), Some(SocketError::ConnectionRefused));
        assert_eq!(socket.connect_state(), ConnectState::Idle);
    }

    #[test]
    #[should_panic(expected = "without a pending connect")]
    fn test_connect_readiness_while_idle_panics() {
        let reactor = Rc::new(PollReactor::new());
        let dyn_reactor: Rc<dyn Reactor> = reactor.clone();
        let socket = Socket::open(&dyn_reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_event_handler(SocketEvent::Connect, |_| {});
        socket.enable_event(SocketEvent::Connect);
        // An unconnected stream socket polls as writable (hang-up).
        reactor.run_once(Some(std::time::Duration::from_secs(1))).unwrap();
    }

    #[test]
    #[should_panic(expected = "connect result requested")]
    fn test_connect_result_without_connect_panics() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        let _ = socket.connect_result();
    }

    #[test]
    #[should_panic(expected = "conflicts with enabled events")]
    fn test_role_mixing_rejected() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_event_handler(SocketEvent::Read, |_| {});
        socket.add_event_handler(SocketEvent::Accept, |_| {});
        socket.enable_event(SocketEvent::Read);
        socket.enable_event(SocketEvent::Accept);
    }

    #[test]
    #[should_panic(expected = "mixes socket roles")]
    fn test_global_role_mixing_rejected() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_global_handler(|_| {});
        socket.set_global_events(EventSet::ACCEPT | EventSet::CONNECT);
    }

    #[test]
    #[should_panic(expected = "requires a read handler")]
    fn test_enable_without_handler_rejected() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.enable_event(SocketEvent::Read);
    }

    #[test]
    #[should_panic(expected = "already enabled")]
    fn test_double_enable_rejected() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_event_handler(SocketEvent::Write, |_| {});
        socket.enable_event(SocketEvent::Write);
        socket.enable_event(SocketEvent::Write);
    }

    #[test]
    #[should_panic(expected = "is not enabled")]
    fn test_disable_not_enabled_rejected() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_event_handler(SocketEvent::Write, |_| {});
        socket.disable_event(SocketEvent::Write);
    }

    #[test]
    #[should_panic(expected = "while a global handler is installed")]
    fn test_event_handler_after_global_rejected() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        socket.add_global_handler(|_| {});
        socket.add_event_handler(SocketEvent::Read, |_| {});
    }

    #[test]
    fn test_datagram_pktinfo_config() {
        let reactor = poll_reactor();
        let config = SocketConfig {
            packet_info: false,
            ..SocketConfig::default()
        };
        let socket =
            Socket::open_with_config(&reactor, AddrFamily::Ipv4, SocketClass::Datagram, config)
                .unwrap();
        assert!(!socket.has_pktinfo());

        let stream = Socket::open(&reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
        assert!(!stream.has_pktinfo());

        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            let datagram = Socket::open(&reactor, AddrFamily::Ipv4, SocketClass::Datagram).unwrap();
            assert!(datagram.has_pktinfo());
        }
    }

    #[test]
    fn test_debug_output() {
        let socket = Socket::open(&poll_reactor(), AddrFamily::Ipv6, SocketClass::Datagram).unwrap();
        let text = format!("{socket:?}");
        assert!(text.contains("Socket"));
        assert!(text.contains("Datagram"));
    }
}
