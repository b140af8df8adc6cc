//! Integration tests for entities_net_address crate
//!
//! These tests exercise the public address values the way the socket layer
//! consumes them.

use entities_net_address::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

#[test]
fn test_addr_socket_addr_round_trip() {
    let samples = ["127.0.0.1:1", "0.0.0.0:65535", "[::]:0", "[2001:db8::7]:4433"];
    for sample in samples {
        let std_addr: SocketAddr = sample.parse().unwrap();
        let addr = Addr::from(std_addr);
        assert_eq!(addr.to_socket_addr(), Some(std_addr));
        assert_eq!(addr.to_string(), std_addr.to_string());
    }
}

#[test]
fn test_ip_address_from_addr() {
    let addr = Addr::ipv6(Ipv6Addr::LOCALHOST, 10);
    assert_eq!(addr.ip(), IpAddress::Ipv6(Ipv6Addr::LOCALHOST));
    assert_eq!(
        addr.ip().to_ip_addr(),
        Some(IpAddr::V6(Ipv6Addr::LOCALHOST))
    );
}

#[test]
fn test_family_display() {
    assert_eq!(AddrFamily::Ipv4.to_string(), "ipv4");
    assert_eq!(AddrFamily::Ipv6.to_string(), "ipv6");
    assert_eq!(
        Addr::ipv4(Ipv4Addr::BROADCAST, 9).family(),
        Some(AddrFamily::Ipv4)
    );
}
