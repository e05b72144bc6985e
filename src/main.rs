use std::sync::Arc;

use tbc_token_indexer::blob::LocalBlobStore;
use tbc_token_indexer::blockchain::{self, RpcClient};
use tbc_token_indexer::cache::TransactionCache;
use tbc_token_indexer::config::Config;
use tbc_token_indexer::db::{self, checkpoint};
use tbc_token_indexer::state::AppState;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tbc-token-indexer");

    let config = Config::from_env();
    tracing::info!(
        "Configuration loaded: node {}, database {}, genesis height {}, concurrency {}",
        config.node_rpc_url,
        config.database_url,
        config.genesis_height,
        config.max_concurrency
    );

    let db_pool = db::connection::establish_connection(&config.database_url).await?;
    tracing::info!("Database connection established");

    if config.reset_on_start {
        let mut tx = db_pool.begin().await?;
        db::migration::reset_ledger(&mut tx).await?;
        checkpoint::reset(&mut tx, config.genesis_height).await?;
        tx.commit().await?;
        tracing::warn!("Ledger cleared; indexing restarts at height {}", config.genesis_height);
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current cycle");
            signal_token.cancel();
        }
    });

    let cache = TransactionCache::from_config(&config);
    let node = Arc::new(RpcClient::new(&config, cache, shutdown.clone())?);
    let blob_store = Arc::new(LocalBlobStore::new(&config.blob_dir, config.blob_base_url.clone()));

    let state = Arc::new(AppState {
        config,
        db_pool: db_pool.clone(),
        node,
        blob_store,
    });

    blockchain::start_polling(state, shutdown).await?;

    db_pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
