#![cfg(feature = "store-sqlite")]

mod common;

use common::{hashes, MockChain, OTHER, X};
use tempfile::NamedTempFile;
use txwatch::store::{sqlite_store::SqliteStore, SubscriberStore}; // bring trait methods into scope
use txwatch::{Address, StoreError, SubscriptionState, SyncEngine, Transaction};

fn tx(hash: &str, height: u64) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        block_height: height,
        from: X.to_string(),
        to: None,
        value: "0x0".to_string(),
    }
}

#[tokio::test]
async fn sqlite_store_roundtrips() -> anyhow::Result<()> {
    // temp file for each run
    let tmp = NamedTempFile::new()?;
    let store = SqliteStore::new(tmp.path())?;
    let x = Address::parse(X)?;

    // Defaults on a fresh DB
    assert!(store.get_all().await?.is_empty());
    assert!(!store.exists(&x).await?);
    assert!(matches!(store.get(&x).await, Err(StoreError::NotFound(_))));

    let mut state = SubscriptionState::new(x.clone(), 123_456);
    state.transactions = vec![tx("a", 123_456), tx("b", 123_457)];
    state.delivered = 1;
    store.set(&x, state.clone()).await?;
    assert_eq!(store.get(&x).await?, state);
    assert_eq!(store.get_all().await?.get(&x), Some(&state));

    // set is a full replacement
    store.set(&x, SubscriptionState::new(x.clone(), 7)).await?;
    assert_eq!(store.get(&x).await?, SubscriptionState::new(x.clone(), 7));

    let h = store
        .update(&x, |s| {
            s.last_processed_height += 3;
            s.last_processed_height
        })
        .await?;
    assert_eq!(h, 10);

    store.delete(&x).await?;
    store.delete(&x).await?;
    assert!(!store.exists(&x).await?);
    assert!(matches!(
        store.update(&x, |_| ()).await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn progress_survives_reopen() -> anyhow::Result<()> {
    let tmp = NamedTempFile::new()?;
    let chain = MockChain::at(20);
    chain.push_tx(21, "x21", X, Some(OTHER));

    {
        let engine = SyncEngine::new(SqliteStore::new(tmp.path())?, chain.clone());
        engine.subscribe_address(X).await?;
        chain.set_height(22);
        engine.update_transactions_data().await;
    }

    let engine = SyncEngine::new(SqliteStore::new(tmp.path())?, chain.clone());
    let state = engine.store().get(&Address::parse(X)?).await?;
    assert_eq!(state.last_processed_height, 23);

    chain.clear_fetched();
    let txs = engine.get_transactions(X).await?;
    assert_eq!(hashes(&txs), ["x21"]);
    assert!(chain.fetched().is_empty());
    Ok(())
}

#[tokio::test]
async fn in_memory_database_keeps_state_between_calls() -> anyhow::Result<()> {
    let store = SqliteStore::new_in_memory()?;
    let x = Address::parse(X)?;
    store.set(&x, SubscriptionState::new(x.clone(), 1)).await?;
    assert!(store.exists(&x).await?);
    Ok(())
}
