#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use txwatch::{Block, ChainClient, Transaction};

pub const X: &str = "0x00000000000000000000000000000000000000aa";
pub const Y: &str = "0x00000000000000000000000000000000000000bb";
pub const OTHER: &str = "0x00000000000000000000000000000000000000cc";

/// Scriptable in-memory ledger node that records every block fetch.
#[derive(Default)]
pub struct MockChain {
    height: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Vec<Transaction>>>,
    failing: Mutex<HashSet<u64>>,
    height_down: Mutex<bool>,
    fetched: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn at(height: u64) -> Arc<Self> {
        let chain = Self::default();
        *chain.height.lock().unwrap() = height;
        Arc::new(chain)
    }

    pub fn set_height(&self, height: u64) {
        *self.height.lock().unwrap() = height;
    }

    pub fn push_tx(&self, height: u64, hash: &str, from: &str, to: Option<&str>) {
        self.blocks
            .lock()
            .unwrap()
            .entry(height)
            .or_default()
            .push(Transaction {
                hash: hash.to_string(),
                block_height: height,
                from: from.to_string(),
                to: to.map(str::to_string),
                value: "0x1".to_string(),
            });
    }

    pub fn fail_block(&self, height: u64) {
        self.failing.lock().unwrap().insert(height);
    }

    pub fn heal_block(&self, height: u64) {
        self.failing.lock().unwrap().remove(&height);
    }

    pub fn set_height_down(&self, down: bool) {
        *self.height_down.lock().unwrap() = down;
    }

    /// Heights fetched so far (successful or not), in call order.
    pub fn fetched(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn clear_fetched(&self) {
        self.fetched.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn current_height(&self) -> anyhow::Result<u64> {
        if *self.height_down.lock().unwrap() {
            anyhow::bail!("node unreachable");
        }
        Ok(*self.height.lock().unwrap())
    }

    async fn block_by_height(&self, height: u64) -> anyhow::Result<Block> {
        self.fetched.lock().unwrap().push(height);
        if self.failing.lock().unwrap().contains(&height) {
            anyhow::bail!("block {height} unavailable");
        }
        if height > *self.height.lock().unwrap() {
            anyhow::bail!("block {height} not found");
        }
        Ok(Block {
            height,
            hash: Some(format!("0xblock{height}")),
            transactions: self
                .blocks
                .lock()
                .unwrap()
                .get(&height)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

pub fn hashes(txs: &[Transaction]) -> Vec<&str> {
    txs.iter().map(|t| t.hash.as_str()).collect()
}
