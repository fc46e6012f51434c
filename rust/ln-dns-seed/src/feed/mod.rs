//! Peer Feed Module
//!
//! Periodically pulls the known network graph from a Lightning node and
//! folds it into the registry. A failed poll changes nothing: the registry
//! keeps serving what the last good poll delivered.

mod lightningd;

pub use lightningd::LightningRpcFeed;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::api::Metrics;
use crate::registry::PeerRegistry;
use crate::types::{NodeId, PeerAddress};

/// A node as reported by a feed, already validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedNode {
    pub id: NodeId,
    pub addresses: Vec<PeerAddress>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("RPC response has no result")]
    MissingResult,

    #[error("Connection closed before a complete response")]
    Closed,

    #[error("Response exceeds {0} bytes")]
    ResponseTooLarge(usize),

    #[error("RPC call timed out")]
    Timeout,
}

/// Source of node announcements gossiped on the Lightning network
#[async_trait]
pub trait PeerFeed: Send + Sync {
    /// Fetch every node the source knows about
    async fn fetch_nodes(&self) -> Result<Vec<FeedNode>, FeedError>;

    /// Name for log lines
    fn name(&self) -> &str;
}

/// Polls a feed on a fixed interval
pub struct FeedPoller {
    feed: Box<dyn PeerFeed>,
    registry: Arc<PeerRegistry>,
    metrics: Arc<Metrics>,
    interval: Duration,
}

impl FeedPoller {
    pub fn new(
        feed: Box<dyn PeerFeed>,
        registry: Arc<PeerRegistry>,
        metrics: Arc<Metrics>,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            registry,
            metrics,
            interval,
        }
    }

    /// Poll now, then every interval. Never returns.
    pub async fn run(self) {
        info!(
            "🔄 Polling {} every {}s",
            self.feed.name(),
            self.interval.as_secs()
        );

        // First tick completes immediately
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.poll_once().await {
                error!("Error trying to get update from {}: {}", self.feed.name(), e);
            }
        }
    }

    /// One poll; returns the number of nodes written to the registry
    pub async fn poll_once(&self) -> Result<usize, FeedError> {
        let nodes = match self.feed.fetch_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                self.metrics.inc_feed_failures();
                return Err(e);
            }
        };
        self.metrics.inc_feed_polls();

        let fetched = nodes.len();
        let stored = nodes
            .into_iter()
            .filter(|node| self.registry.upsert(node.id, node.addresses.clone()))
            .count();

        debug!(
            "Got {} nodes from {}, {} stored, registry holds {}",
            fetched,
            self.feed.name(),
            stored,
            self.registry.len()
        );

        Ok(stored)
    }
}
