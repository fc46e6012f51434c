//! Cryptographic utilities for the DNS Seed
//!
//! Node identities are secp256k1 keys. Announcements are signed the way
//! Lightning nodes sign them: DER-encoded ECDSA over SHA256(SHA256(message)).
//! Identities travel in DNS labels as bech32 with the `ln` prefix.

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use k256::PublicKey;
use sha2::{Digest, Sha256};

use crate::types::NodeId;

/// Human-readable prefix for node ids in DNS labels
pub const NODE_ID_HRP: Hrp = Hrp::parse_unchecked("ln");

/// 32-byte SHA-256 digest
pub type Hash = [u8; 32];

// =============================================================================
// HASHING
// =============================================================================

/// SHA-256
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// SHA-256 applied twice; the digest announcements are signed over
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

// =============================================================================
// KEYS & SIGNATURES
// =============================================================================

/// Parse a hex-encoded SEC1 public key (compressed or uncompressed)
pub fn public_key_from_hex(hex_str: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(hex_str).map_err(|_| CryptoError::InvalidHex)?;
    PublicKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Parse a hex-encoded DER signature
pub fn signature_from_der_hex(hex_str: &str) -> Result<Signature, CryptoError> {
    let bytes = hex::decode(hex_str).map_err(|_| CryptoError::InvalidHex)?;
    Signature::from_der(&bytes).map_err(|_| CryptoError::InvalidSignature)
}

/// Verify `signature` over SHA256(SHA256(message)).
///
/// High-S signatures are accepted: they are normalized before the check.
pub fn verify_double_sha256(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let digest = double_sha256(message);
    let signature = signature.normalize_s().unwrap_or_else(|| signature.clone());

    VerifyingKey::from(public_key)
        .verify_prehash(&digest, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

// =============================================================================
// BECH32 NODE IDS
// =============================================================================

/// Encode a node id as a bech32 DNS label (`ln1...`)
pub fn encode_node_id(id: &NodeId) -> Result<String, CryptoError> {
    bech32::encode::<Bech32>(NODE_ID_HRP, id.as_bytes())
        .map_err(|e| CryptoError::Bech32(e.to_string()))
}

/// Decode a bech32 DNS label back into a validated node id
pub fn decode_node_id(label: &str) -> Result<NodeId, CryptoError> {
    let checked = CheckedHrpstring::new::<Bech32>(label)
        .map_err(|e| CryptoError::Bech32(e.to_string()))?;

    if checked.hrp() != NODE_ID_HRP {
        return Err(CryptoError::WrongPrefix(checked.hrp().to_string()));
    }

    let bytes: Vec<u8> = checked.byte_iter().collect();
    let key = PublicKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(NodeId::from_public_key(&key))
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid hex encoding")]
    InvalidHex,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature encoding")]
    InvalidSignature,

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Invalid bech32: {0}")]
    Bech32(String),

    #[error("Unexpected bech32 prefix: {0}")]
    WrongPrefix(String),
}

// =============================================================================
// TESTS
// =============================================================================
