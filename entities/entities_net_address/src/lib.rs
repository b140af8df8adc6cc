//! Entities Layer: Network Addresses
//!
//! Provides the portable address values exchanged with the event-driven socket
//! layer. Nothing in this crate touches the operating system: native socket
//! address structures are produced and consumed by the adapters layer.
//!
//! ## Overview
//!
//! The `entities_net_address` crate is part of the entities layer. It defines:
//! - **[`Addr`]**: a transport address (IPv4 or IPv6 host plus port), or the
//!   explicit absence of one
//! - **[`IpAddress`]**: a bare IP address as recovered from packet info, with an
//!   explicit invalid marker
//! - **[`AddrFamily`]**: the address family selector used when opening sockets
//!
//! ## Usage
//!
//! ```rust
//! use entities_net_address::{Addr, AddrFamily};
//!
//! let addr: Addr = "127.0.0.1:4000".parse().unwrap();
//! assert_eq!(addr.family(), Some(AddrFamily::Ipv4));
//! assert_eq!(addr.port(), Some(4000));
//! assert_eq!(addr.to_string(), "127.0.0.1:4000");
//! ```
//!
//! ## See Also
//!
//! - [`adapters_socket`](../adapters_socket/index.html): translates these values
//!   to and from native socket addresses

pub mod addr;

pub use addr::{Addr, AddrFamily, AddrParseError, IpAddress};
