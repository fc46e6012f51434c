//! Announcement Wire Format
//!
//! ```text
//! <signature hex> NODE <public key hex> <ip> <port>
//! ```
//!
//! The signature is DER-encoded ECDSA over SHA256(SHA256(m)) where `m` is
//! the last four tokens joined by single spaces.

use k256::PublicKey;

use super::AnnouncementError;
use crate::crypto;
use crate::types::{NodeId, PeerAddress};

/// Marker token in second position
pub const ANNOUNCEMENT_TAG: &str = "NODE";

/// An announcement split into its tokens, not yet verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement<'a> {
    pub signature_hex: &'a str,
    pub public_key_hex: &'a str,
    pub ip: &'a str,
    pub port: &'a str,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAnnouncement {
    /// Derived from the verified key, never copied from the text
    pub node_id: NodeId,
    pub address: PeerAddress,
}

impl<'a> Announcement<'a> {
    /// Split a message into announcement tokens
    pub fn parse(text: &'a str) -> Result<Self, AnnouncementError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match *tokens.as_slice() {
            [signature_hex, ANNOUNCEMENT_TAG, public_key_hex, ip, port] => Ok(Self {
                signature_hex,
                public_key_hex,
                ip,
                port,
            }),
            _ => Err(AnnouncementError::NotAnnouncement),
        }
    }

    /// The exact bytes the signature covers
    pub fn signed_message(&self) -> String {
        format!(
            "{} {} {} {}",
            ANNOUNCEMENT_TAG, self.public_key_hex, self.ip, self.port
        )
    }

    /// Check the signature, then the address it vouches for
    pub fn verify(&self) -> Result<VerifiedAnnouncement, AnnouncementError> {
        let signature = crypto::signature_from_der_hex(self.signature_hex)?;
        let public_key: PublicKey = crypto::public_key_from_hex(self.public_key_hex)?;

        crypto::verify_double_sha256(&public_key, self.signed_message().as_bytes(), &signature)?;

        let port = parse_port(self.port)?;
        let address = PeerAddress::parse(self.ip, port)
            .ok_or_else(|| AnnouncementError::InvalidAddress(self.ip.to_string()))?;

        Ok(VerifiedAnnouncement {
            node_id: NodeId::from_public_key(&public_key),
            address,
        })
    }
}

fn parse_port(port: &str) -> Result<u16, AnnouncementError> {
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AnnouncementError::InvalidPort(port.to_string()));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(AnnouncementError::InvalidPort(port.to_string())),
        Ok(port) => Ok(port),
    }
}
