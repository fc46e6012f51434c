//! Peer Registry Storage
//!
//! One `HashMap` behind one mutex. Every operation holds the lock only for
//! the map access itself: no I/O, no hashing, no awaits. If lookup volume
//! ever outgrows a single lock, this is the place to shard.

use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::RegistryStats;
use crate::types::{NodeClass, NodeId, PeerAddress, PeerRecord};

/// Shared registry of known peers
pub struct PeerRegistry {
    peers: Mutex<HashMap<NodeId, PeerRecord>>,

    /// Port that earns the DEFAULT_PORT classification bit
    default_port: u16,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new(default_port: u16) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            default_port,
        }
    }

    /// Replace everything known about `id`.
    ///
    /// The classification is computed from `addresses` alone, so bits from an
    /// earlier record never survive. An empty address list stores nothing.
    /// Returns whether a record was written.
    pub fn upsert(&self, id: NodeId, addresses: Vec<PeerAddress>) -> bool {
        if addresses.is_empty() {
            debug!("Ignoring {} with no usable addresses", id);
            return false;
        }

        let record = PeerRecord::new(id, addresses, self.default_port);
        self.lock().insert(id, record);
        true
    }

    /// Get a peer by id
    pub fn lookup(&self, id: &NodeId) -> Option<PeerRecord> {
        self.lock().get(id).cloned()
    }

    /// Sample up to `max_count` distinct peers whose classification
    /// intersects `mask` (or any peer for `NodeClass::ANY`).
    pub fn sample(&self, mask: NodeClass, max_count: usize) -> Vec<PeerRecord> {
        self.sample_with_rng(mask, max_count, &mut rand::thread_rng())
    }

    /// `sample` with a caller-supplied RNG
    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        mask: NodeClass,
        max_count: usize,
        rng: &mut R,
    ) -> Vec<PeerRecord> {
        if max_count == 0 {
            return Vec::new();
        }

        let mut picked: Vec<PeerRecord> = {
            let peers = self.lock();
            peers
                .values()
                .filter(|p| p.class.matches(mask))
                .choose_multiple(rng, max_count)
                .into_iter()
                .cloned()
                .collect()
        };

        // choose_multiple does not randomize the order of the result
        picked.shuffle(rng);
        picked
    }

    /// Number of stored peers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let peers = self.lock();
        let count = |class: NodeClass| peers.values().filter(|p| p.class.contains(class)).count();

        RegistryStats {
            total_peers: peers.len(),
            ipv4_peers: count(NodeClass::IPV4),
            ipv6_peers: count(NodeClass::IPV6),
            default_port_peers: count(NodeClass::DEFAULT_PORT),
        }
    }

    /// A panic while holding the lock cannot leave a half-written record
    /// (inserts are single map operations), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, PeerRecord>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
