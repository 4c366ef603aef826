//! Periodic background trigger for [`SyncEngine::update_transactions_data`].
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{chain_source::ChainClient, engine::SyncEngine, store::SubscriberStore};

/// Handle to the background batch-advance task.
///
/// Ticks are fire-and-forget: a failed tick is not retried, the next one resumes
/// from whatever progress the store holds. Stopping cancels future ticks and
/// interrupts an in-flight pass between two block fetches.
pub struct BackgroundSync {
    cancel: CancellationToken,
    failures: Arc<AtomicU32>,
    handle: JoinHandle<()>,
}

impl BackgroundSync {
    /// Spawn the task; the first pass runs one `period` from now.
    pub fn spawn<S, C>(engine: Arc<SyncEngine<S, C>>, period: Duration) -> Self
    where
        S: SubscriberStore + 'static,
        C: ChainClient + 'static,
    {
        let cancel = CancellationToken::new();
        let failures = Arc::new(AtomicU32::new(0));

        let task_cancel = cancel.clone();
        let task_failures = Arc::clone(&failures);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(?period, "background sync started");

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = engine.update_transactions_data_with_cancel(&task_cancel).await;
                        if report.failed() {
                            let n = task_failures.fetch_add(1, Ordering::Relaxed) + 1;
                            warn!(consecutive_failures = n, stopped = ?report.stopped, "background tick failed");
                        } else {
                            task_failures.store(0, Ordering::Relaxed);
                            debug!(blocks = report.blocks_scanned, matched = report.matched, "background tick ok");
                        }
                    }
                }
            }
            info!("background sync stopped");
        });

        Self {
            cancel,
            failures,
            handle,
        }
    }

    /// Ticks that failed in a row since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Signal the task to stop without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "background sync task panicked");
        }
    }
}
