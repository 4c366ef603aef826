use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use txwatch::prelude::*;
use txwatch::Block;

/// Chain stub: fixed tip, empty blocks, counts fetches.
struct EmptyChain {
    tip: u64,
    fetches: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl ChainClient for EmptyChain {
    async fn current_height(&self) -> anyhow::Result<u64> {
        Ok(self.tip)
    }

    async fn block_by_height(&self, height: u64) -> anyhow::Result<Block> {
        self.fetches.lock().unwrap().push(height);
        Ok(Block {
            height,
            ..Block::default()
        })
    }
}

#[tokio::test]
async fn engine_compiles_and_runs_with_no_hits() -> anyhow::Result<()> {
    let fetches = Arc::new(Mutex::new(Vec::new()));
    let chain = EmptyChain {
        tip: 3,
        fetches: fetches.clone(),
    };
    let engine = SyncEngine::new(MemoryStore::new(), chain);

    assert_eq!(engine.current_block().await?, 3);

    // No subscribers: the batch pass fetches nothing
    let report = engine.update_transactions_data().await;
    assert_eq!(report.blocks_scanned, 0);
    assert!(fetches.lock().unwrap().is_empty());

    // One subscriber, empty blocks: nothing matched, progress still moves
    engine.subscribe_address("alice").await?;
    assert!(engine.get_transactions("alice").await?.is_empty());
    assert_eq!(*fetches.lock().unwrap(), vec![3]);
    assert_eq!(engine.store().len(), 1);

    Ok(())
}
