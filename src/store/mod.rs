//! Subscriber state and the store interface the engine reads and mutates.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{address::Address, chain_source::Transaction, error::StoreError};

/// Sync progress and matched history for one subscribed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    address: Address,
    /// Next height not yet scanned: every block below it has been scanned.
    pub last_processed_height: u64,
    /// Matched transactions in discovery order. Only ever appended to.
    pub transactions: Vec<Transaction>,
    /// Number of leading `transactions` already handed out by catch-up.
    pub delivered: usize,
}

impl SubscriptionState {
    /// Fresh state that starts scanning at `height`.
    pub fn new(address: Address, height: u64) -> Self {
        Self {
            address,
            last_processed_height: height,
            transactions: Vec::new(),
            delivered: 0,
        }
    }

    /// Address this state belongs to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Matched transactions not yet returned by catch-up.
    pub fn undelivered(&self) -> &[Transaction] {
        &self.transactions[self.delivered.min(self.transactions.len())..]
    }

    /// Record that `[from, scanned_to)` was scanned and produced `matches`.
    ///
    /// Matches below the stored height were already recorded by whichever path
    /// scanned them first and are dropped; the height never moves backwards.
    /// A state whose height is below `from` (replaced while the scan ran) is left
    /// untouched, since advancing it would skip `[height, from)`.
    /// Returns how many matches were appended.
    pub fn merge_scan(&mut self, from: u64, scanned_to: u64, matches: Vec<Transaction>) -> usize {
        let floor = self.last_processed_height;
        if floor < from || scanned_to <= floor {
            return 0;
        }
        let before = self.transactions.len();
        self.transactions.extend(
            matches
                .into_iter()
                .filter(|tx| tx.block_height >= floor && tx.block_height < scanned_to),
        );
        self.last_processed_height = scanned_to;
        self.transactions.len() - before
    }

    /// Hand out everything not yet delivered and mark it delivered.
    pub fn take_undelivered(&mut self) -> Vec<Transaction> {
        let out = self.undelivered().to_vec();
        self.delivered = self.transactions.len();
        out
    }
}

/// Concurrent address → [`SubscriptionState`] mapping.
///
/// Every operation is atomic with respect to the others. Implementations never
/// hand out references into their internal map.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Isolated copy of every subscription.
    async fn get_all(&self) -> Result<HashMap<Address, SubscriptionState>, StoreError>;

    /// State for `address`, or [`StoreError::NotFound`].
    async fn get(&self, address: &Address) -> Result<SubscriptionState, StoreError>;

    /// Insert or fully replace the entry for `address`.
    async fn set(&self, address: &Address, state: SubscriptionState) -> Result<(), StoreError>;

    /// Whether `address` has an entry.
    async fn exists(&self, address: &Address) -> Result<bool, StoreError>;

    /// Remove the entry; absent entries are not an error.
    async fn delete(&self, address: &Address) -> Result<(), StoreError>;

    /// Atomically read, modify and write back one entry.
    ///
    /// [`StoreError::NotFound`] if `address` has no entry; `f` is not called then.
    async fn update<F, R>(&self, address: &Address, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut SubscriptionState) -> R + Send + 'static,
        R: Send + 'static;
}

pub mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;
#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteStore;
