//! Interface-derived broadcast addressing for leader discovery.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use contracts::RpcConfig;
use tracing::debug;

/// Compute the directed broadcast address for `ip` under `prefix_len`.
pub fn broadcast_address(ip: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    debug_assert!(prefix_len >= 1 && prefix_len <= 31);
    let mask = u32::MAX << (32 - prefix_len as u32);
    Ipv4Addr::from(u32::from(ip) | !mask)
}

/// Best-effort discovery of the local IPv4 address.
///
/// Opens an unbound UDP socket and "connects" it to a routable address;
/// no packet is sent, the kernel just picks the outgoing interface.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:53").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    }
}

/// The address a client sends to before it has latched the leader.
///
/// Uses the configured override when present, otherwise derives the
/// broadcast address from the local interface and the configured prefix
/// length, falling back to the limited broadcast address.
pub fn discovery_address(config: &RpcConfig) -> SocketAddr {
    let ip = match config.broadcast_addr {
        Some(addr) => addr,
        None => match local_ipv4() {
            Some(local) => broadcast_address(local, config.prefix_len),
            None => Ipv4Addr::BROADCAST,
        },
    };
    let addr = SocketAddr::new(IpAddr::V4(ip), config.port);
    debug!(%addr, "discovery address resolved");
    addr
}
