//! Orchestrator for per-address transaction tracking:
//! 1) seed a subscription at the current chain height,
//! 2) catch a single address up on demand,
//! 3) advance every subscriber together in one shared scan.
use anyhow::anyhow;
use std::{collections::HashMap, future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    address::Address,
    chain_source::{Block, ChainClient, Transaction},
    error::{StoreError, SyncError},
    store::{SubscriberStore, SubscriptionState},
};

/// Why a scan loop ended before reaching the chain height it started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStop {
    /// The height query failed; nothing was scanned.
    ChainUnavailable,
    /// Fetching the block at `height` failed; progress stops just below it.
    FetchFailed {
        /// First height that could not be fetched.
        height: u64,
    },
    /// The cancellation token fired between two fetches.
    Cancelled,
    /// The subscriber store failed.
    Store,
}

/// Summary of one [`SyncEngine::update_transactions_data`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Chain height observed at the start of the pass.
    pub chain_height: Option<u64>,
    /// Number of blocks fetched.
    pub blocks_scanned: u64,
    /// Number of (subscriber, height) advances persisted.
    pub advances: usize,
    /// Number of transactions appended across all subscribers.
    pub matched: usize,
    /// Set when the pass ended early.
    pub stopped: Option<ScanStop>,
}

impl BatchReport {
    /// Whether the pass hit a failure (cancellation is not a failure).
    pub fn failed(&self) -> bool {
        matches!(
            self.stopped,
            Some(ScanStop::ChainUnavailable | ScanStop::FetchFailed { .. } | ScanStop::Store)
        )
    }
}

/// Result of scanning `[from, next)` for one address.
struct Scan {
    next: u64,
    matches: Vec<Transaction>,
    stopped: Option<ScanStop>,
}

/// Core engine. `S` = subscriber store, `C` = ledger node client.
///
/// The engine holds no per-address state of its own: every call re-reads the
/// store and persists progress through [`SubscriberStore::update`], so the
/// on-demand and background paths can run concurrently.
pub struct SyncEngine<S, C> {
    store: S,
    client: C,
    request_timeout: Option<Duration>,
}

impl<S, C> SyncEngine<S, C>
where
    S: SubscriberStore + 'static,
    C: ChainClient + 'static,
{
    /// Create a new engine over a store and a chain client.
    pub fn new(store: S, client: C) -> Self {
        Self {
            store,
            client,
            request_timeout: None,
        }
    }

    /// Bound every node request; an elapsed deadline counts as a client error.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current chain height as reported by the node.
    pub async fn current_block(&self) -> Result<u64, SyncError> {
        self.chain_height().await.map_err(SyncError::ChainUnavailable)
    }

    /// Start tracking `address` from the current chain height.
    ///
    /// Any prior state for the address is replaced, history included.
    ///
    /// # Errors
    /// `InvalidAddress`, `ChainUnavailable`, or a store failure.
    pub async fn subscribe_address(&self, address: &str) -> Result<Address, SyncError> {
        let address = Address::parse(address)?;
        let height = self.current_block().await?;
        self.store
            .set(&address, SubscriptionState::new(address.clone(), height))
            .await?;
        info!(%address, height, "subscribed");
        Ok(address)
    }

    /// Stop tracking `address`. Unknown addresses are not an error.
    pub async fn unsubscribe_address(&self, address: &str) -> Result<(), SyncError> {
        let address = Address::parse(address)?;
        self.store.delete(&address).await?;
        info!(%address, "unsubscribed");
        Ok(())
    }

    /// Whether `address` is currently tracked.
    pub async fn is_subscribed(&self, address: &str) -> Result<bool, SyncError> {
        let address = Address::parse(address)?;
        Ok(self.store.exists(&address).await?)
    }

    /// Every transaction matched for `address` since it was subscribed.
    pub async fn transaction_history(&self, address: &str) -> Result<Vec<Transaction>, SyncError> {
        let address = Address::parse(address)?;
        Ok(self.store.get(&address).await?.transactions)
    }

    /// Catch `address` up to the current chain height.
    ///
    /// Returns every matched transaction not handed out by an earlier call: the
    /// ones queued by background passes, then the ones found by this scan. A block
    /// fetch failure ends the scan early without an error; progress is persisted
    /// up to the failed height and the next call resumes there.
    ///
    /// # Errors
    /// `InvalidAddress`, `NotSubscribed`, `ChainUnavailable` (height query only),
    /// `InvariantViolation` when stored progress is past the chain, or a store failure.
    pub async fn get_transactions(&self, address: &str) -> Result<Vec<Transaction>, SyncError> {
        self.get_transactions_with_cancel(address, &CancellationToken::new())
            .await
    }

    /// [`get_transactions`](Self::get_transactions) that also stops between block
    /// fetches once `cancel` fires, with the same partial-progress semantics.
    pub async fn get_transactions_with_cancel(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Transaction>, SyncError> {
        let address = Address::parse(address)?;
        if !self.store.exists(&address).await? {
            return Err(SyncError::NotSubscribed(address));
        }

        let chain = self.current_block().await?;
        let state = self.store.get(&address).await?;
        let from = state.last_processed_height;

        // `chain + 1` means fully caught up; anything beyond is inconsistent.
        if from > chain.saturating_add(1) {
            return Err(SyncError::InvariantViolation {
                address,
                stored: from,
                chain,
            });
        }

        let scan = self.scan_for(&address, from, chain, cancel).await;
        match scan.stopped {
            Some(stop) => warn!(%address, from, next = scan.next, ?stop, "catch-up stopped early"),
            None => debug!(%address, from, to = chain, "catch-up complete"),
        }

        let Scan { next, matches, .. } = scan;
        let delivered = self
            .store
            .update(&address, move |s| {
                s.merge_scan(from, next, matches);
                s.take_undelivered()
            })
            .await?;
        Ok(delivered)
    }

    /// Advance every subscriber to the current chain height in one pass.
    ///
    /// Each block from the lowest outstanding height up to the chain height is
    /// fetched once and fanned out to the subscribers due at that height. Never
    /// fails: problems end the pass early and are reported in the [`BatchReport`].
    pub async fn update_transactions_data(&self) -> BatchReport {
        self.update_transactions_data_with_cancel(&CancellationToken::new())
            .await
    }

    /// [`update_transactions_data`](Self::update_transactions_data) that also
    /// stops between block fetches once `cancel` fires.
    pub async fn update_transactions_data_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        let chain = match self.chain_height().await {
            Ok(h) => h,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "batch advance skipped: chain unavailable");
                report.stopped = Some(ScanStop::ChainUnavailable);
                return report;
            }
        };
        report.chain_height = Some(chain);

        let snapshot = match self.store.get_all().await {
            Ok(all) => all,
            Err(error) => {
                warn!(%error, "batch advance skipped: store unavailable");
                report.stopped = Some(ScanStop::Store);
                return report;
            }
        };

        // Where each subscriber is expected to be; refreshed from every write.
        let mut expected: HashMap<Address, u64> = snapshot
            .into_iter()
            .map(|(addr, state)| (addr, state.last_processed_height))
            .collect();
        let Some(start) = expected.values().copied().min() else {
            return report;
        };

        for height in start..=chain {
            if cancel.is_cancelled() {
                report.stopped = Some(ScanStop::Cancelled);
                break;
            }
            let block = match self.fetch_block(height).await {
                Ok(b) => b,
                Err(error) => {
                    warn!(height, error = %format!("{error:#}"), "batch advance stopped: block fetch failed");
                    report.stopped = Some(ScanStop::FetchFailed { height });
                    break;
                }
            };
            report.blocks_scanned += 1;

            let due: Vec<Address> = expected
                .iter()
                .filter(|(_, h)| **h == height)
                .map(|(a, _)| a.clone())
                .collect();

            for address in due {
                let matches = matching(&address, height, &block);
                let outcome = self
                    .store
                    .update(&address, move |s| {
                        // Skip anyone another path moved away from this height.
                        let advanced = s.last_processed_height == height;
                        let added = if advanced {
                            s.merge_scan(height, height + 1, matches)
                        } else {
                            0
                        };
                        (s.last_processed_height, advanced, added)
                    })
                    .await;

                match outcome {
                    Ok((now, advanced, added)) => {
                        expected.insert(address, now);
                        if advanced {
                            report.advances += 1;
                            report.matched += added;
                        }
                    }
                    Err(StoreError::NotFound(_)) => {
                        // unsubscribed mid-pass
                        expected.remove(&address);
                    }
                    Err(error) => {
                        warn!(%address, height, %error, "batch advance: store update failed");
                        expected.remove(&address);
                    }
                }
            }
        }

        info!(
            chain_height = chain,
            blocks = report.blocks_scanned,
            advances = report.advances,
            matched = report.matched,
            stopped = ?report.stopped,
            "batch advance finished"
        );
        report
    }

    async fn scan_for(
        &self,
        address: &Address,
        from: u64,
        to: u64,
        cancel: &CancellationToken,
    ) -> Scan {
        let mut scan = Scan {
            next: from,
            matches: Vec::new(),
            stopped: None,
        };
        while scan.next <= to {
            if cancel.is_cancelled() {
                scan.stopped = Some(ScanStop::Cancelled);
                break;
            }
            let height = scan.next;
            match self.fetch_block(height).await {
                Ok(block) => {
                    debug!(%address, height, txs = block.transactions.len(), "scanned block");
                    scan.matches.extend(matching(address, height, &block));
                    scan.next += 1;
                }
                Err(error) => {
                    warn!(%address, height, error = %format!("{error:#}"), "block fetch failed");
                    scan.stopped = Some(ScanStop::FetchFailed { height });
                    break;
                }
            }
        }
        scan
    }

    async fn chain_height(&self) -> anyhow::Result<u64> {
        self.bounded("current height", self.client.current_height())
            .await
    }

    async fn fetch_block(&self, height: u64) -> anyhow::Result<Block> {
        self.bounded("block fetch", self.client.block_by_height(height))
            .await
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| anyhow!("{what} timed out after {limit:?}"))?,
            None => fut.await,
        }
    }
}

/// Transactions in `block` sent from or to `address`, stamped with the height they were fetched at.
fn matching(address: &Address, height: u64, block: &Block) -> Vec<Transaction> {
    block
        .transactions
        .iter()
        .filter(|tx| {
            address.matches(&tx.from) || tx.to.as_deref().is_some_and(|to| address.matches(to))
        })
        .map(|tx| Transaction {
            block_height: height,
            ..tx.clone()
        })
        .collect()
}
