//! Announcement Verifier Module
//!
//! Nodes broadcast signed one-line claims on an IRC channel:
//!
//! ```text
//! <signature hex> NODE <public key hex> <ip> <port>
//! ```
//!
//! ## Protocol
//!
//! 1. IrcTailer joins the channel and forwards every PRIVMSG body
//! 2. Bodies that are not announcements are ignored
//! 3. The signature is checked against the embedded key
//! 4. The key's compressed form becomes the identity
//! 5. The registry record for that identity is replaced
//!
//! ## Security
//!
//! Only integrity is checked. Announcements carry no timestamp or nonce,
//! so a captured message can be replayed for as long as it is wanted.

mod irc;
mod protocol;

pub use irc::IrcTailer;
pub use protocol::Announcement;

use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::api::Metrics;
use crate::crypto::CryptoError;
use crate::registry::PeerRegistry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnouncementError {
    #[error("not an announcement")]
    NotAnnouncement,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Verifies announcements and records their senders
pub struct AnnouncementVerifier {
    registry: Arc<PeerRegistry>,
    metrics: Arc<Metrics>,
}

impl AnnouncementVerifier {
    pub fn new(registry: Arc<PeerRegistry>, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }

    /// Process one message body. Returns whether the registry was updated.
    pub fn handle_message(&self, text: &str) -> bool {
        let announcement = match Announcement::parse(text) {
            Ok(announcement) => announcement,
            Err(_) => {
                trace!("Ignoring non-announcement message");
                return false;
            }
        };

        let verified = match announcement.verify() {
            Ok(verified) => verified,
            Err(e) => {
                warn!("Rejected announcement for {}: {}", announcement.public_key_hex, e);
                self.metrics.inc_announcements_rejected();
                return false;
            }
        };

        let stored = self
            .registry
            .upsert(verified.node_id, vec![verified.address]);
        if stored {
            self.metrics.inc_announcements_accepted();
            debug!("📣 Added node {} @ {}", verified.node_id, verified.address);
        }
        stored
    }
}
