//! Adapters Layer: Event-Driven Sockets
//!
//! Provides non-blocking TCP and UDP sockets that register with a
//! single-threaded reactor and deliver readiness to user handlers. The
//! `socket2` crate supplies the native socket; everything else is layered on
//! top of it here.
//!
//! ## Overview
//!
//! The `adapters_socket` crate provides:
//! - **Socket core**: open, bind, listen, connect, accept, send and receive
//!   variants, peer and local address queries
//! - **Event subscription**: one global handler or per-event handlers for
//!   READ, WRITE, ACCEPT and CONNECT
//! - **Connect state machine**: `Idle` → `Pending` → `Resolved` → `Idle`
//! - **Receive fairness**: a per-dispatch cap on receive calls
//! - **Packet info**: datagram source selection and destination recovery,
//!   degrading to plain datagram I/O where unsupported
//! - **Dispatch safety**: handlers may free the socket they were called for
//!
//! ## Architecture
//!
//! This crate is part of the adapters layer. It depends on:
//! - `adapters_reactor`: the reactor interface sockets register with
//! - `entities_net_address`: portable address values
//!
//! Platform differences are confined to `backend` (readiness vs event-object
//! notification) and `sys` (error codes, native sizes, ancillary data).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use adapters_reactor::{PollReactor, Reactor};
//! use adapters_socket::{Socket, SocketClass, SocketEvent};
//! use entities_net_address::{Addr, AddrFamily};
//!
//! let poll = Rc::new(PollReactor::new());
//! let reactor: Rc<dyn Reactor> = poll.clone();
//!
//! let listener = Socket::open(&reactor, AddrFamily::Ipv4, SocketClass::Stream).unwrap();
//! listener.bind(&"127.0.0.1:0".parse::<Addr>().unwrap()).unwrap();
//! listener.listen(0).unwrap();
//! listener.add_event_handler(SocketEvent::Accept, |_| println!("connection pending"));
//! listener.enable_event(SocketEvent::Accept);
//!
//! poll.run_once(None).unwrap();
//! ```
//!
//! ## See Also
//!
//! - [`adapters_reactor`](../adapters_reactor/index.html): reactor interface and poll reactor
//! - [`entities_net_address`](../entities_net_address/index.html): address values

pub mod addr;
mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
mod handlers;
pub mod socket;
mod sys;

#[cfg(all(test, unix))]
mod test_support;

pub use config::{RecvLimit, SocketConfig, DEFAULT_BACKLOG, DEFAULT_RECV_MAX};
pub use dispatch::InstanceId;
pub use error::{Operation, SocketError};
pub use event::{EventSet, SocketEvent};
pub use socket::{ConnectState, Datagram, Socket, SocketClass};
