//! Core types shared by the registry, the DNS front end and the peer sources
//!
//! Node identities are secp256k1 public keys in their 33-byte compressed
//! form. A `NodeId` can only be built from a parsed key, so anything stored
//! in the registry has already been through point validation.

use chrono::{DateTime, Utc};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::crypto::{self, CryptoError};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Well-known Lightning P2P port
pub const DEFAULT_PORT: u16 = 9735;

/// Length of a compressed secp256k1 public key
pub const NODE_ID_LENGTH: usize = 33;

// =============================================================================
// NODE IDENTITY
// =============================================================================

/// Canonical node identity (compressed secp256k1 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_LENGTH]);

impl NodeId {
    /// Derive the identity from a verified public key
    pub fn from_public_key(key: &PublicKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut bytes = [0u8; NODE_ID_LENGTH];
        bytes.copy_from_slice(point.as_bytes());
        Self(bytes)
    }

    /// Parse a hex-encoded key (compressed or uncompressed) into its canonical identity
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let key = crypto::public_key_from_hex(hex_str)?;
        Ok(Self::from_public_key(&key))
    }

    /// Compressed key bytes
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LENGTH] {
        &self.0
    }

    /// Canonical lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

// =============================================================================
// ADDRESSES
// =============================================================================

/// A reachable peer address. The port is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeerAddress(SocketAddr);

impl PeerAddress {
    /// Build an address, rejecting port 0.
    ///
    /// IPv4-mapped IPv6 addresses are folded to plain IPv4.
    pub fn new(ip: IpAddr, port: u16) -> Option<Self> {
        if port == 0 {
            return None;
        }
        Some(Self(SocketAddr::new(ip.to_canonical(), port)))
    }

    /// Parse an IP literal and port
    pub fn parse(ip: &str, port: u16) -> Option<Self> {
        ip.parse::<IpAddr>().ok().and_then(|ip| Self::new(ip, port))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self.0.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        }
    }

    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        match self.0.ip() {
            IpAddr::V4(_) => None,
            IpAddr::V6(v6) => Some(v6),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Per-peer classification bitfield.
///
/// The same bit values are used by the registry when classifying peers and
/// by the DNS front end when building sample masks, including the `a<mask>`
/// label of SRV queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct NodeClass(u8);

impl NodeClass {
    /// Peer has at least one IPv6 address
    pub const IPV6: NodeClass = NodeClass(1);

    /// Peer listens on the well-known port on at least one address
    pub const DEFAULT_PORT: NodeClass = NodeClass(1 << 1);

    /// Peer has at least one IPv4 address
    pub const IPV4: NodeClass = NodeClass(1 << 2);

    /// Matches every peer when used as a sample mask
    pub const ANY: NodeClass = NodeClass(0xFF);

    /// Default address-type mask: both address families
    pub const BOTH_FAMILIES: NodeClass = NodeClass(Self::IPV4.0 | Self::IPV6.0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Compute the classification of an address list from scratch
    pub fn classify(addresses: &[PeerAddress], default_port: u16) -> Self {
        let mut bits = 0u8;
        for addr in addresses {
            bits |= match addr.ip() {
                IpAddr::V4(_) => Self::IPV4.0,
                IpAddr::V6(_) => Self::IPV6.0,
            };
            if addr.port() == default_port {
                bits |= Self::DEFAULT_PORT.0;
            }
        }
        Self(bits)
    }

    /// Whether this classification satisfies a sample mask
    pub fn matches(self, mask: NodeClass) -> bool {
        mask == Self::ANY || self.0 & mask.0 != 0
    }

    pub fn contains(self, other: NodeClass) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for NodeClass {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// =============================================================================
// PEER RECORD
// =============================================================================

/// Everything the seed knows about one node
#[derive(Debug, Clone, Serialize)]
pub struct PeerRecord {
    /// Canonical identity
    pub id: NodeId,

    /// Known addresses, in the order the source reported them
    pub addresses: Vec<PeerAddress>,

    /// When the record was last written
    pub last_seen: DateTime<Utc>,

    /// Derived from `addresses` on every write
    pub class: NodeClass,
}

impl PeerRecord {
    /// Build a record, classifying its addresses
    pub fn new(id: NodeId, addresses: Vec<PeerAddress>, default_port: u16) -> Self {
        let class = NodeClass::classify(&addresses, default_port);
        Self {
            id,
            addresses,
            last_seen: Utc::now(),
            class,
        }
    }

    pub fn ipv4_addrs(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.addresses.iter().filter_map(PeerAddress::ipv4)
    }

    pub fn ipv6_addrs(&self) -> impl Iterator<Item = Ipv6Addr> + '_ {
        self.addresses.iter().filter_map(PeerAddress::ipv6)
    }

    /// Port of the first address; used for SRV answers
    pub fn first_port(&self) -> Option<u16> {
        self.addresses.first().map(PeerAddress::port)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    /// Deterministic test key; `seed` must be non-zero
    pub(crate) fn test_signing_key(seed: u8) -> SigningKey {
        let mut bytes = [0u8; 32];
        bytes[31] = seed;
        bytes[0] = 0x42;
        SigningKey::from_slice(&bytes).unwrap()
    }

    pub(crate) fn test_node_id(seed: u8) -> NodeId {
        let key = test_signing_key(seed);
        NodeId::from_public_key(&PublicKey::from(key.verifying_key()))
    }

    pub(crate) fn addr(s: &str) -> PeerAddress {
        let sock: SocketAddr = s.parse().unwrap();
        PeerAddress::new(sock.ip(), sock.port()).unwrap()
    }

    #[test]
    fn test_node_id_is_compressed_hex() {
        let id = test_node_id(1);
        let hex_str = id.to_hex();
        assert_eq!(hex_str.len(), 66);
        assert!(hex_str.starts_with("02") || hex_str.starts_with("03"));
    }

    #[test]
    fn test_node_id_from_uncompressed_hex_is_canonical() {
        let key = test_signing_key(7);
        let uncompressed = key.verifying_key().to_encoded_point(false);
        let id = NodeId::from_hex(&hex::encode(uncompressed.as_bytes())).unwrap();
        assert_eq!(id, test_node_id(7));
    }

    #[test]
    fn test_node_id_rejects_garbage() {
        assert!(NodeId::from_hex("zz").is_err());
        assert!(NodeId::from_hex(&"02".repeat(10)).is_err());
        // right length, not on the curve
        assert!(NodeId::from_hex(&format!("05{}", "11".repeat(32))).is_err());
    }

    #[test]
    fn test_peer_address_rejects_port_zero() {
        assert!(PeerAddress::parse("10.0.0.1", 0).is_none());
        assert!(PeerAddress::parse("not-an-ip", 9735).is_none());
        assert!(PeerAddress::parse("10.0.0.1", 9735).is_some());
    }

    #[test]
    fn test_peer_address_folds_mapped_ipv4() {
        let a = PeerAddress::parse("::ffff:10.0.0.1", 9735).unwrap();
        assert_eq!(a.ipv4(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(a.ipv6().is_none());
    }

    #[test]
    fn test_classify() {
        let v4_default = [addr("10.0.0.1:9735")];
        assert_eq!(
            NodeClass::classify(&v4_default, DEFAULT_PORT),
            NodeClass::IPV4 | NodeClass::DEFAULT_PORT
        );

        let v6_other = [addr("[2001:db8::1]:1234")];
        assert_eq!(NodeClass::classify(&v6_other, DEFAULT_PORT), NodeClass::IPV6);

        let both = [addr("10.0.0.1:1234"), addr("[2001:db8::1]:9735")];
        let class = NodeClass::classify(&both, DEFAULT_PORT);
        assert!(class.contains(NodeClass::BOTH_FAMILIES | NodeClass::DEFAULT_PORT));

        assert_eq!(NodeClass::classify(&[], DEFAULT_PORT).bits(), 0);
    }

    #[test]
    fn test_class_matches() {
        let v4 = NodeClass::IPV4;
        assert!(v4.matches(NodeClass::IPV4));
        assert!(v4.matches(NodeClass::BOTH_FAMILIES));
        assert!(!v4.matches(NodeClass::IPV6));
        assert!(v4.matches(NodeClass::ANY));
        assert!(NodeClass::default().matches(NodeClass::ANY));
        assert!(!NodeClass::default().matches(NodeClass::IPV4));
    }

    #[test]
    fn test_record_address_views() {
        let record = PeerRecord::new(
            test_node_id(3),
            vec![addr("[2001:db8::1]:9736"), addr("10.0.0.1:9735")],
            DEFAULT_PORT,
        );
        assert_eq!(record.ipv4_addrs().count(), 1);
        assert_eq!(record.ipv6_addrs().count(), 1);
        assert_eq!(record.first_port(), Some(9736));
    }
}
