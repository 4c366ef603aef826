//! Interactive front end: subscribe addresses and poll their transactions while a
//! background task advances every subscriber on a fixed interval.
use anyhow::Result;
use clap::Parser;
use std::{sync::Arc, time::Duration};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use txwatch::{
    BackgroundSync, ChainClient, HttpChainClient, MemoryStore, SubscriberStore, SyncConfig,
    SyncEngine, Transaction,
};

/// Track transactions of subscribed addresses on an Ethereum JSON-RPC node.
#[derive(Parser, Debug)]
#[command(name = "txwatch", version, about, long_about = None)]
struct Args {
    /// JSON-RPC endpoint URL (overrides TXWATCH_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Seconds between background passes (overrides TXWATCH_POLL_INTERVAL_SECS)
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Per-request timeout in seconds (overrides TXWATCH_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Persist subscriptions in this SQLite file instead of memory
    #[cfg(feature = "store-sqlite")]
    #[arg(long)]
    db: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = SyncConfig::from_env()?;
    if let Some(endpoint) = args.endpoint.clone() {
        cfg.endpoint = endpoint;
    }
    if let Some(secs) = args.poll_interval_secs.filter(|s| *s > 0) {
        cfg.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.request_timeout_secs.filter(|s| *s > 0) {
        cfg.request_timeout = Duration::from_secs(secs);
    }

    let client = HttpChainClient::new(cfg.endpoint.clone(), cfg.request_timeout)?;
    info!(endpoint = client.endpoint(), "connecting");

    #[cfg(feature = "store-sqlite")]
    {
        if let Some(path) = &args.db {
            return run(txwatch::SqliteStore::new(path)?, client, &cfg).await;
        }
    }
    run(MemoryStore::new(), client, &cfg).await
}

async fn run<S, C>(store: S, client: C, cfg: &SyncConfig) -> Result<()>
where
    S: SubscriberStore + 'static,
    C: ChainClient + 'static,
{
    let engine = Arc::new(SyncEngine::new(store, client).with_request_timeout(cfg.request_timeout));
    let background = BackgroundSync::spawn(Arc::clone(&engine), cfg.poll_interval);

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    loop {
        stdout
            .write_all(b"Enter command (block, subscribe, transaction, history, unsubscribe, exit): ")
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let args: Vec<&str> = line.split_whitespace().collect();
        match args.as_slice() {
            [] => error!("no command entered"),
            ["exit"] | ["quit"] => break,
            ["block"] => match engine.current_block().await {
                Ok(h) => println!("current block: {h}"),
                Err(e) => error!(error = %e, "block"),
            },
            ["subscribe", addr] => match engine.subscribe_address(addr).await {
                Ok(a) => println!("subscribed {a}"),
                Err(e) => error!(error = %e, "subscribe"),
            },
            ["unsubscribe", addr] => match engine.unsubscribe_address(addr).await {
                Ok(()) => println!("unsubscribed {addr}"),
                Err(e) => error!(error = %e, "unsubscribe"),
            },
            ["transaction", addr] => match engine.get_transactions(addr).await {
                Ok(txs) => print_transactions(&txs),
                Err(e) => error!(error = %e, "transaction"),
            },
            ["history", addr] => match engine.transaction_history(addr).await {
                Ok(txs) => print_transactions(&txs),
                Err(e) => error!(error = %e, "history"),
            },
            [cmd @ ("subscribe" | "unsubscribe" | "transaction" | "history")] => {
                error!("{cmd}: missing address")
            }
            [other, ..] => error!(
                "invalid action {other:?}; expected one of block, subscribe, transaction, history, unsubscribe, exit"
            ),
        }
    }

    background.shutdown().await;
    Ok(())
}

fn print_transactions(txs: &[Transaction]) {
    if txs.is_empty() {
        println!("no transactions");
        return;
    }
    for tx in txs {
        println!(
            "#{} {} {} -> {} value {}",
            tx.block_height,
            tx.hash,
            tx.from,
            tx.to.as_deref().unwrap_or("(contract creation)"),
            tx.value
        );
    }
}
