//! Address Module
//!
//! Transport and IP address values. IPv6 flow information and scope identifiers
//! are not represented; conversions from `std::net` drop them.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrFamily {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrFamily::Ipv4 => f.write_str("ipv4"),
            AddrFamily::Ipv6 => f.write_str("ipv6"),
        }
    }
}

/// Error returned when parsing an [`Addr`] from text fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transport address syntax: {input:?}")]
pub struct AddrParseError {
    input: String,
}

/// Portable transport address
///
/// `None` is a legal value wherever an address is optional, e.g. the local
/// address of a datagram sent without a source override. Socket operations that
/// require a concrete address treat `None` as a caller bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Addr {
    /// No address
    #[default]
    None,
    /// IPv4 host and port
    Ipv4 { ip: Ipv4Addr, port: u16 },
    /// IPv6 host and port
    Ipv6 { ip: Ipv6Addr, port: u16 },
}

impl Addr {
    /// Create an IPv4 transport address
    pub fn ipv4(ip: impl Into<Ipv4Addr>, port: u16) -> Self {
        Addr::Ipv4 { ip: ip.into(), port }
    }

    /// Create an IPv6 transport address
    pub fn ipv6(ip: impl Into<Ipv6Addr>, port: u16) -> Self {
        Addr::Ipv6 { ip: ip.into(), port }
    }

    /// Address family, or `None` for [`Addr::None`]
    pub fn family(&self) -> Option<AddrFamily> {
        match self {
            Addr::None => None,
            Addr::Ipv4 { .. } => Some(AddrFamily::Ipv4),
            Addr::Ipv6 { .. } => Some(AddrFamily::Ipv6),
        }
    }

    /// Port number, or `None` for [`Addr::None`]
    pub fn port(&self) -> Option<u16> {
        match self {
            Addr::None => None,
            Addr::Ipv4 { port, .. } | Addr::Ipv6 { port, .. } => Some(*port),
        }
    }

    /// Host part of the address
    pub fn ip(&self) -> IpAddress {
        match self {
            Addr::None => IpAddress::Invalid,
            Addr::Ipv4 { ip, .. } => IpAddress::Ipv4(*ip),
            Addr::Ipv6 { ip, .. } => IpAddress::Ipv6(*ip),
        }
    }

    /// Check whether this is the empty address
    pub fn is_none(&self) -> bool {
        matches!(self, Addr::None)
    }

    /// Convert to a `std::net` socket address
    ///
    /// # Returns
    ///
    /// * `Some(SocketAddr)` - For IPv4 and IPv6 addresses (IPv6 flow info and scope are zero)
    /// * `None` - For [`Addr::None`]
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        match *self {
            Addr::None => None,
            Addr::Ipv4 { ip, port } => Some(SocketAddr::V4(SocketAddrV4::new(ip, port))),
            Addr::Ipv6 { ip, port } => Some(SocketAddr::V6(SocketAddrV6::new(ip, port, 0, 0))),
        }
    }
}

impl From<SocketAddr> for Addr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Addr::Ipv4 { ip: *v4.ip(), port: v4.port() },
            SocketAddr::V6(v6) => Addr::Ipv6 { ip: *v6.ip(), port: v6.port() },
        }
    }
}

impl From<SocketAddrV4> for Addr {
    fn from(addr: SocketAddrV4) -> Self {
        Addr::from(SocketAddr::V4(addr))
    }
}

impl From<SocketAddrV6> for Addr {
    fn from(addr: SocketAddrV6) -> Self {
        Addr::from(SocketAddr::V6(addr))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => addr.fmt(f),
            None => f.write_str("none"),
        }
    }
}

impl FromStr for Addr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(Addr::None);
        }
        SocketAddr::from_str(s)
            .map(Addr::from)
            .map_err(|_| AddrParseError { input: s.to_string() })
    }
}

/// Bare IP address with an explicit invalid marker
///
/// Used for the local address of a datagram, which is only known when the
/// socket can receive packet info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IpAddress {
    /// Unknown or not applicable
    #[default]
    Invalid,
    /// IPv4 address
    Ipv4(Ipv4Addr),
    /// IPv6 address
    Ipv6(Ipv6Addr),
}

impl IpAddress {
    /// Check whether an address is present
    pub fn is_valid(&self) -> bool {
        !matches!(self, IpAddress::Invalid)
    }

    /// Address family, or `None` when invalid
    pub fn family(&self) -> Option<AddrFamily> {
        match self {
            IpAddress::Invalid => None,
            IpAddress::Ipv4(_) => Some(AddrFamily::Ipv4),
            IpAddress::Ipv6(_) => Some(AddrFamily::Ipv6),
        }
    }

    /// Convert to a `std::net` IP address
    pub fn to_ip_addr(&self) -> Option<IpAddr> {
        match *self {
            IpAddress::Invalid => None,
            IpAddress::Ipv4(ip) => Some(IpAddr::V4(ip)),
            IpAddress::Ipv6(ip) => Some(IpAddr::V6(ip)),
        }
    }

    /// Combine with a port into a transport address
    pub fn with_port(&self, port: u16) -> Addr {
        match *self {
            IpAddress::Invalid => Addr::None,
            IpAddress::Ipv4(ip) => Addr::Ipv4 { ip, port },
            IpAddress::Ipv6(ip) => Addr::Ipv6 { ip, port },
        }
    }
}

impl From<IpAddr> for IpAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => IpAddress::Ipv4(v4),
            IpAddr::V6(v6) => IpAddress::Ipv6(v6),
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(ip: Ipv4Addr) -> Self {
        IpAddress::Ipv4(ip)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(ip: Ipv6Addr) -> Self {
        IpAddress::Ipv6(ip)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ip_addr() {
            Some(ip) => ip.fmt(f),
            None => f.write_str("invalid"),
        }
    }
}
