//! Error kinds surfaced by the sync engine and subscriber stores.
use thiserror::Error;

use crate::address::Address;

/// Errors returned to callers of [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The chain client failed (transport, timeout, non-success status, bad payload).
    #[error("chain unavailable: {0:#}")]
    ChainUnavailable(#[source] anyhow::Error),

    /// Empty or malformed address identifier.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The operation requires a prior subscription.
    #[error("address {0} is not subscribed")]
    NotSubscribed(Address),

    /// Stored progress is beyond what the chain reports (rollback or a bug).
    #[error("stored height {stored} for {address} is ahead of chain height {chain}")]
    InvariantViolation {
        /// Address whose state is inconsistent.
        address: Address,
        /// Next height recorded as unscanned.
        stored: u64,
        /// Height reported by the node.
        chain: u64,
    },

    /// The subscriber store backend failed.
    #[error(transparent)]
    Store(StoreError),
}

/// Errors returned by [`SubscriberStore`](crate::SubscriberStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No state is recorded for the address.
    #[error("address {0} not found in store")]
    NotFound(Address),

    /// Backend failure (I/O, encoding, ...).
    #[error("store backend: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(address) => SyncError::NotSubscribed(address),
            other => SyncError::Store(other),
        }
    }
}
