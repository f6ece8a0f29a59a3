//! Common types for the session transport layer.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// An IPv4 address + port pair as carried on the wire.
///
/// Used both for a participant's TCP peer address and for the UDP
/// endpoint it advertises at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// IPv4 address
    pub address: Ipv4Addr,

    /// Port (host byte order)
    pub port: u16,
}

impl Endpoint {
    /// `0.0.0.0:0`, used for slots that have not registered yet.
    pub const UNSPECIFIED: Endpoint = Endpoint {
        address: Ipv4Addr::UNSPECIFIED,
        port: 0,
    };

    /// Creates a new endpoint.
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// Converts a socket address, mapping IPv4-mapped IPv6 addresses back
    /// to IPv4. Other IPv6 addresses have no wire representation and
    /// become `0.0.0.0`.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        let address = match addr.ip() {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => v6.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
        };
        Self::new(address, addr.port())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_endpoint_from_v4_socket_addr() {
        let addr: SocketAddr = "10.0.0.7:4000".parse().unwrap();
        let endpoint = Endpoint::from_socket_addr(addr);

        assert_eq!(endpoint.address, Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(endpoint.port, 4000);
        assert_eq!(endpoint.to_string(), "10.0.0.7:4000");
    }

    #[test]
    fn test_endpoint_from_mapped_v6() {
        let mapped = Ipv4Addr::new(127, 0, 0, 1).to_ipv6_mapped();
        let addr = SocketAddr::new(IpAddr::V6(mapped), 5000);
        assert_eq!(
            Endpoint::from_socket_addr(addr),
            Endpoint::new(Ipv4Addr::LOCALHOST, 5000)
        );

        // Native IPv6 has no 4-byte form
        let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 5000);
        assert_eq!(Endpoint::from_socket_addr(addr).address, Ipv4Addr::UNSPECIFIED);
    }
}
