//! Embedded SQLite store implementation for subscriber progress.
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::{collections::HashMap, path::Path, sync::Arc};
use tokio::task;

use crate::{
    address::Address,
    chain_source::Transaction,
    error::StoreError,
    store::{SubscriberStore, SubscriptionState},
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS subscribers (
        address               TEXT PRIMARY KEY,
        last_processed_height INTEGER NOT NULL,
        delivered             INTEGER NOT NULL,
        transactions          TEXT NOT NULL
    );
"#;

/// One row per subscription:
///   subscribers(address TEXT PRIMARY KEY, last_processed_height INTEGER,
///               delivered INTEGER, transactions TEXT)
///
/// `transactions` holds the matched history as a JSON array. A single connection
/// behind a mutex serializes every operation.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Creates/initializes the SQLite file at `path`.
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database (useful for tests).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || f(&*conn.lock()))
            .await
            .context("sqlite task panicked")?
    }

    fn load(conn: &Connection, address: &Address) -> anyhow::Result<Option<SubscriptionState>> {
        let row = conn
            .query_row(
                "SELECT last_processed_height, delivered, transactions
                 FROM subscribers WHERE address = ?1",
                params![address.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(height, delivered, txs)| decode(address.clone(), height, delivered, &txs))
            .transpose()
    }

    fn save(conn: &Connection, address: &Address, state: &SubscriptionState) -> anyhow::Result<()> {
        let height = i64::try_from(state.last_processed_height).context("height overflows i64")?;
        let delivered = i64::try_from(state.delivered).context("delivered overflows i64")?;
        let txs = serde_json::to_string(&state.transactions).context("encode transactions")?;
        conn.execute(
            "INSERT INTO subscribers(address, last_processed_height, delivered, transactions)
             VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(address) DO UPDATE SET
                last_processed_height = excluded.last_processed_height,
                delivered = excluded.delivered,
                transactions = excluded.transactions",
            params![address.as_str(), height, delivered, txs],
        )?;
        Ok(())
    }
}

fn decode(address: Address, height: i64, delivered: i64, txs: &str) -> anyhow::Result<SubscriptionState> {
    let transactions: Vec<Transaction> =
        serde_json::from_str(txs).with_context(|| format!("decode transactions for {address}"))?;
    let mut state = SubscriptionState::new(
        address,
        u64::try_from(height).context("negative last_processed_height")?,
    );
    state.transactions = transactions;
    state.delivered = usize::try_from(delivered).context("negative delivered")?;
    Ok(state)
}

#[async_trait]
impl SubscriberStore for SqliteStore {
    async fn get_all(&self) -> Result<HashMap<Address, SubscriptionState>, StoreError> {
        self.blocking(|conn| {
            let mut stmt = conn
                .prepare("SELECT address, last_processed_height, delivered, transactions FROM subscribers")
                .context("prepare get_all")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .context("query subscribers")?;

            let mut out = HashMap::new();
            for row in rows {
                let (addr, height, delivered, txs) = row.context("read subscriber row")?;
                let address = Address::parse(&addr)
                    .map_err(|e| anyhow::anyhow!("stored address {addr:?}: {e}"))?;
                let state = decode(address.clone(), height, delivered, &txs)?;
                out.insert(address, state);
            }
            Ok(out)
        })
        .await
    }

    async fn get(&self, address: &Address) -> Result<SubscriptionState, StoreError> {
        let address = address.clone();
        self.blocking(move |conn| {
            Self::load(conn, &address)?.ok_or(StoreError::NotFound(address))
        })
        .await
    }

    async fn set(&self, address: &Address, state: SubscriptionState) -> Result<(), StoreError> {
        let address = address.clone();
        self.blocking(move |conn| Ok(Self::save(conn, &address, &state)?))
            .await
    }

    async fn exists(&self, address: &Address) -> Result<bool, StoreError> {
        let address = address.clone();
        self.blocking(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM subscribers WHERE address = ?1",
                    params![address.as_str()],
                    |_| Ok(()),
                )
                .optional()
                .context("query subscriber")?;
            Ok(found.is_some())
        })
        .await
    }

    async fn delete(&self, address: &Address) -> Result<(), StoreError> {
        let address = address.clone();
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM subscribers WHERE address = ?1",
                params![address.as_str()],
            )
            .context("delete subscriber")?;
            Ok(())
        })
        .await
    }

    async fn update<F, R>(&self, address: &Address, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut SubscriptionState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let address = address.clone();
        self.blocking(move |conn| {
            let tx = conn.unchecked_transaction().context("begin update")?;
            let mut state =
                Self::load(conn, &address)?.ok_or_else(|| StoreError::NotFound(address.clone()))?;
            let out = f(&mut state);
            Self::save(conn, &address, &state)?;
            tx.commit().context("commit update")?;
            Ok(out)
        })
        .await
    }
}
