//! Address Translator Module
//!
//! Converts between portable [`Addr`] values and native socket addresses.
//! IPv6 flow information and scope identifiers are always zero on the way out
//! and dropped on the way in.

use std::net::{SocketAddrV4, SocketAddrV6};

use entities_net_address::{Addr, AddrFamily};
use socket2::{Domain, SockAddr};

use crate::sys;

/// Translate a portable address to a native one
///
/// # Panics
///
/// Panics on [`Addr::None`]: every operation that sends or binds to an
/// address requires a concrete one.
pub fn to_native(addr: &Addr) -> SockAddr {
    match *addr {
        Addr::Ipv4 { ip, port } => SockAddr::from(SocketAddrV4::new(ip, port)),
        Addr::Ipv6 { ip, port } => SockAddr::from(SocketAddrV6::new(ip, port, 0, 0)),
        Addr::None => panic!("address translation requires an IPv4 or IPv6 address, got none"),
    }
}

/// Translate a native address returned by the OS to a portable one
///
/// # Panics
///
/// Panics if the family is neither IPv4 nor IPv6, or if the length does not
/// match the native structure of the family exactly.
pub fn from_native(addr: &SockAddr) -> Addr {
    let len = addr.len() as usize;
    let domain = addr.domain();

    if domain == Domain::IPV4 {
        assert_eq!(
            len,
            sys::SOCKADDR_IN_LEN,
            "IPv4 native address has unexpected length"
        );
        if let Some(v4) = addr.as_socket_ipv4() {
            return Addr::from(v4);
        }
    } else if domain == Domain::IPV6 {
        assert_eq!(
            len,
            sys::SOCKADDR_IN6_LEN,
            "IPv6 native address has unexpected length"
        );
        if let Some(v6) = addr.as_socket_ipv6() {
            return Addr::from(v6);
        }
    }

    panic!("unsupported native address family {domain:?}")
}

/// Native domain for an address family
pub(crate) fn domain_of(family: AddrFamily) -> Domain {
    match family {
        AddrFamily::Ipv4 => Domain::IPV4,
        AddrFamily::Ipv6 => Domain::IPV6,
    }
}
