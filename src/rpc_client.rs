//! JSON-RPC 2.0 [`ChainClient`] over HTTP for Ethereum-compatible nodes.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::chain_source::{Block, ChainClient, ChainRequest, Transaction};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    hash: Option<String>,
    #[serde(default)]
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
}

impl RpcTransaction {
    fn into_transaction(self, block_height: u64) -> Transaction {
        Transaction {
            hash: self.hash,
            block_height,
            from: self.from,
            to: self.to,
            value: self.value,
        }
    }
}

/// HTTP JSON-RPC client for a single node endpoint.
pub struct HttpChainClient {
    http: reqwest::Client,
    endpoint: String,
    request_id: AtomicU64,
}

impl HttpChainClient {
    /// Build a client for `endpoint`; `timeout` bounds every HTTP round trip.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Node endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<R: DeserializeOwned>(&self, request: ChainRequest) -> Result<Option<R>> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method: request.method(),
            params: request.params(),
            id,
        };
        debug!(method = body.method, id, "json-rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("send {}", request.method()))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {status}", request.method());
        }

        let rpc: JsonRpcResponse<R> = response
            .json()
            .await
            .with_context(|| format!("decode {} response", request.method()))?;

        if let Some(err) = rpc.error {
            bail!("{} failed: rpc error {}: {}", request.method(), err.code, err.message);
        }
        Ok(rpc.result)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn current_height(&self) -> Result<u64> {
        let hex: String = self
            .call(ChainRequest::GetHeight)
            .await?
            .ok_or_else(|| anyhow!("eth_blockNumber returned no result"))?;
        parse_hex_u64(&hex)
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        let raw: RpcBlock = self
            .call(ChainRequest::GetBlockByHeight {
                height,
                full_transactions: true,
            })
            .await?
            .ok_or_else(|| anyhow!("block {height} not found"))?;

        Ok(Block {
            height,
            hash: raw.hash,
            transactions: raw
                .transactions
                .into_iter()
                .map(|tx| tx.into_transaction(height))
                .collect(),
        })
    }
}

/// Decode a `0x`-prefixed base-16 quantity.
pub fn parse_hex_u64(s: &str) -> Result<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("quantity {s:?} lacks 0x prefix"))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("parse hex quantity {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert_eq!(parse_hex_u64("0x3e8").unwrap(), 1000);
        assert_eq!(parse_hex_u64("0X3E8").unwrap(), 1000);
        assert!(parse_hex_u64("3e8").is_err());
        assert!(parse_hex_u64("0x").is_err());
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn decodes_block_payload() {
        let payload = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "hash": "0xabc",
                "transactions": [
                    {"hash": "0x1", "blockNumber": "0x3ea", "from": "0xaa", "to": "0xbb", "value": "0x10"},
                    {"hash": "0x2", "blockNumber": "0x3ea", "from": "0xaa", "to": null, "value": "0x0"}
                ]
            }
        }"#;
        let rpc: JsonRpcResponse<RpcBlock> = serde_json::from_str(payload).unwrap();
        let block = rpc.result.unwrap();
        assert_eq!(block.hash.as_deref(), Some("0xabc"));
        let txs: Vec<_> = block
            .transactions
            .into_iter()
            .map(|t| t.into_transaction(1002))
            .collect();
        assert_eq!(txs[0].to.as_deref(), Some("0xbb"));
        assert_eq!(txs[1].to, None);
        assert!(txs.iter().all(|t| t.block_height == 1002));
    }

    #[test]
    fn decodes_rpc_error_and_null_result() {
        let err: JsonRpcResponse<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"boom"}}"#,
        )
        .unwrap();
        assert_eq!(err.error.unwrap().code, -32000);

        let null: JsonRpcResponse<RpcBlock> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(null.result.is_none());
    }
}
