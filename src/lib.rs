#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! txwatch: incremental per-address transaction tracking over a ledger node.
//!
//! ## What you implement
//! - [`ChainClient`]: report the chain height and fetch blocks by height
//!   (or use the bundled [`HttpChainClient`] for Ethereum JSON-RPC).
//! - [`SubscriberStore`]: keep per-address progress and matched history
//!   (or use [`MemoryStore`] / [`SqliteStore`]).
//!
//! ## What the engine does
//! - Seeds each subscription at the current chain height.
//! - Catches one address up **on demand**, persisting partial progress when a
//!   block fetch fails so the next call resumes at the failed height.
//! - Advances **all** subscribers in one periodic pass, fetching each block once
//!   and never rewinding an address another path already moved ahead.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use txwatch::prelude::*;
//! use std::{sync::Arc, time::Duration};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let client = HttpChainClient::new("https://cloudflare-eth.com", Duration::from_secs(30))?;
//!     let engine = Arc::new(SyncEngine::new(MemoryStore::new(), client));
//!
//!     engine.subscribe_address("0xc426e53c0da077676a66edf2245e990e9832d4a0").await?;
//!     let background = BackgroundSync::spawn(engine.clone(), Duration::from_secs(300));
//!
//!     let txs = engine.get_transactions("0xc426e53c0da077676a66edf2245e990e9832d4a0").await?;
//!     println!("{} new transactions", txs.len());
//!
//!     background.shutdown().await;
//!     Ok(())
//! }
//! ```
/// Address identifiers and normalization.
pub mod address;

/// Ledger node abstraction and block/transaction types.
pub mod chain_source;

/// Configuration (endpoint, poll interval, request timeout).
pub mod config;

/// Catch-up and batch-advance engine.
pub mod engine;

/// Error kinds.
pub mod error;

/// JSON-RPC over HTTP client.
pub mod rpc_client;

/// Background tick driver.
pub mod scheduler;

/// Subscriber state and stores.
pub mod store;

// Public re-exports
pub use address::Address;
pub use chain_source::{Block, ChainClient, ChainRequest, Transaction};
pub use config::SyncConfig;
pub use engine::{BatchReport, ScanStop, SyncEngine};
pub use error::{StoreError, SyncError};
pub use rpc_client::HttpChainClient;
pub use scheduler::BackgroundSync;
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;
pub use store::{MemoryStore, SubscriberStore, SubscriptionState};

/// Convenience prelude for end users.
pub mod prelude {
    #[cfg(feature = "store-sqlite")]
    pub use crate::SqliteStore;
    pub use crate::{
        BackgroundSync, ChainClient, HttpChainClient, MemoryStore, SubscriberStore, SyncEngine,
        SyncError, Transaction,
    };
}
