//! Peer Registry Module
//!
//! In-memory view of the reachable part of the network. Fed by the
//! lightningd poller and by verified announcements, read by the DNS server.
//! Nothing is persisted and nothing expires: the registry lives as long as
//! the process.

mod storage;

pub use storage::PeerRegistry;

use serde::Serialize;

/// Snapshot of registry composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Total peers in registry
    pub total_peers: usize,

    /// Peers with at least one IPv4 address
    pub ipv4_peers: usize,

    /// Peers with at least one IPv6 address
    pub ipv6_peers: usize,

    /// Peers listening on the well-known port
    pub default_port_peers: usize,
}
