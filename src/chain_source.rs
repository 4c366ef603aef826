//! Abstractions for reading blocks from a ledger node (JSON-RPC over HTTP, or a test double).
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A transaction as observed in a fetched block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: String,
    /// Height of the block that contains the transaction.
    pub block_height: u64,
    /// Sender address.
    pub from: String,
    /// Recipient address; `None` for contract creation.
    pub to: Option<String>,
    /// Transferred value, as reported by the node.
    pub value: String,
}

/// A block with its full transaction bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Block height.
    pub height: u64,
    /// Block hash, when the node reports one.
    pub hash: Option<String>,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}

/// Closed set of node requests the engine relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRequest {
    /// Latest block height.
    GetHeight,
    /// One block by height.
    GetBlockByHeight {
        /// Height to fetch.
        height: u64,
        /// Return full transaction objects instead of hashes.
        full_transactions: bool,
    },
}

impl ChainRequest {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            ChainRequest::GetHeight => "eth_blockNumber",
            ChainRequest::GetBlockByHeight { .. } => "eth_getBlockByNumber",
        }
    }

    /// JSON-RPC positional params; heights are `0x`-prefixed hex on the wire.
    pub fn params(&self) -> Value {
        match self {
            ChainRequest::GetHeight => json!([]),
            ChainRequest::GetBlockByHeight {
                height,
                full_transactions,
            } => json!([format!("{height:#x}"), full_transactions]),
        }
    }
}

/// Ledger node the engine scans.
///
/// Implementations are stateless from the engine's point of view: every call is
/// independent and may be issued concurrently from the foreground and the
/// background path.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Height of the most recent block known to the node.
    async fn current_height(&self) -> anyhow::Result<u64>;

    /// Fetch the block at `height` with full transaction bodies.
    async fn block_by_height(&self, height: u64) -> anyhow::Result<Block>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for std::sync::Arc<T> {
    async fn current_height(&self) -> anyhow::Result<u64> {
        (**self).current_height().await
    }

    async fn block_by_height(&self, height: u64) -> anyhow::Result<Block> {
        (**self).block_by_height(height).await
    }
}
