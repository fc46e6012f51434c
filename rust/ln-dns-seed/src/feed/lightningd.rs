//! lightningd JSON-RPC Feed
//!
//! One connection per poll to the node's unix socket, one `listnodes` call.
//! lightningd does not length-prefix its replies; each one ends with a
//! blank line, and the reply is parsed once that terminator arrives.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use super::{FeedError, FeedNode, PeerFeed};
use crate::types::{NodeId, PeerAddress};

/// Upper bound for one full request/response exchange
const RPC_TIMEOUT_SECS: u64 = 30;

/// Reply size after which we give up (the full graph is a few MB)
const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// lightningd ends every reply with a blank line
const REPLY_TERMINATOR: &[u8] = b"\n\n";

/// Address types lightningd reports that we can serve over DNS
const SERVABLE_ADDRESS_TYPES: [&str; 2] = ["ipv4", "ipv6"];

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<ListNodesResult>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListNodesResult {
    #[serde(default)]
    nodes: Vec<RpcNode>,
}

#[derive(Debug, Deserialize)]
struct RpcNode {
    nodeid: String,
    #[serde(default)]
    addresses: Vec<RpcAddress>,
}

#[derive(Debug, Deserialize)]
struct RpcAddress {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    port: u16,
}

/// Peer feed backed by a local lightningd
pub struct LightningRpcFeed {
    socket_path: PathBuf,
    next_id: AtomicU64,
}

impl LightningRpcFeed {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call_listnodes(&self) -> Result<RpcResponse, FeedError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "listnodes",
            "params": {},
        });

        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(&serde_json::to_vec(&request)?).await?;
        stream.flush().await?;

        let mut response = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        while !response.ends_with(REPLY_TERMINATOR) {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                // Closed without the terminator: usable only if complete
                break;
            }
            response.extend_from_slice(&chunk[..n]);

            if response.len() > MAX_RESPONSE_SIZE {
                return Err(FeedError::ResponseTooLarge(response.len()));
            }
            trace!("listnodes: {} bytes so far", response.len());
        }

        serde_json::from_slice(&response).map_err(|e| {
            if e.is_eof() {
                FeedError::Closed
            } else {
                e.into()
            }
        })
    }
}

#[async_trait]
impl PeerFeed for LightningRpcFeed {
    async fn fetch_nodes(&self) -> Result<Vec<FeedNode>, FeedError> {
        let timeout = Duration::from_secs(RPC_TIMEOUT_SECS);
        let response = tokio::time::timeout(timeout, self.call_listnodes())
            .await
            .map_err(|_| FeedError::Timeout)??;

        if let Some(error) = response.error {
            return Err(FeedError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = response.result.ok_or(FeedError::MissingResult)?;

        Ok(result.nodes.into_iter().filter_map(to_feed_node).collect())
    }

    fn name(&self) -> &str {
        "lightningd"
    }
}

/// Keep a node only if its id parses and it has a servable address
fn to_feed_node(node: RpcNode) -> Option<FeedNode> {
    let id = match NodeId::from_hex(&node.nodeid) {
        Ok(id) => id,
        Err(e) => {
            debug!("Skipping node {:?}: {}", node.nodeid, e);
            return None;
        }
    };

    let addresses: Vec<PeerAddress> = node
        .addresses
        .iter()
        .filter(|a| SERVABLE_ADDRESS_TYPES.contains(&a.kind.as_str()))
        .filter_map(|a| PeerAddress::parse(a.address.as_deref()?, a.port))
        .collect();

    if addresses.is_empty() {
        return None;
    }
    Some(FeedNode { id, addresses })
}
