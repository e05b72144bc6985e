use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::blacklist::Blacklist;
use crate::blob::BlobStore;
use crate::blockchain::client::{NodeRpc, RpcError};
use crate::blockchain::processor::{process_transaction, BlockContext};
use crate::blockchain::worker_pool::WorkerPool;
use crate::config::Config;
use crate::db::checkpoint::{self, Checkpoint};
use crate::error::Result;
use crate::ledger::history;
use crate::models::UNCONFIRMED_HEIGHT;
use crate::state::AppState;

/// In-memory scan progress. Mirrors the persisted checkpoint after every
/// committed cycle, plus the delay before the next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerState {
    pub height: i64,
    pub mempool: Vec<String>,
    pub last_mempool: Vec<String>,
    pub interval: Duration,
}

impl ScannerState {
    pub fn from_checkpoint(checkpoint: Checkpoint, interval: Duration) -> Self {
        Self {
            height: checkpoint.height,
            mempool: checkpoint.mempool,
            last_mempool: checkpoint.last_mempool,
            interval,
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            height: self.height,
            mempool: self.mempool.clone(),
            last_mempool: self.last_mempool.clone(),
        }
    }

    /// Whether `txid` was already handled in this or the previous rollover.
    pub fn in_window(&self, txid: &str) -> bool {
        self.mempool.iter().any(|t| t == txid) || self.last_mempool.iter().any(|t| t == txid)
    }

    /// Observed txids outside the de-duplication window, first occurrence only.
    pub fn new_transactions(&self, observed: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        observed
            .iter()
            .filter(|txid| !self.in_window(txid) && seen.insert(txid.as_str()))
            .cloned()
            .collect()
    }

    /// Checkpoint to persist once `handled` txids are applied.
    ///
    /// A block cycle moves to the next height and rotates the mempool into
    /// `last_mempool`; a tip cycle only extends the mempool.
    pub fn next_checkpoint(&self, caught_up: bool, handled: &[String]) -> Checkpoint {
        let mut mempool = self.mempool.clone();
        mempool.extend(handled.iter().cloned());

        if caught_up {
            Checkpoint {
                height: self.height,
                mempool,
                last_mempool: self.last_mempool.clone(),
            }
        } else {
            Checkpoint {
                height: self.height + 1,
                mempool: Vec::new(),
                last_mempool: mempool,
            }
        }
    }

    pub fn advance(&mut self, checkpoint: Checkpoint, interval: Duration) {
        self.height = checkpoint.height;
        self.mempool = checkpoint.mempool;
        self.last_mempool = checkpoint.last_mempool;
        self.interval = interval;
    }
}

/// What one committed cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub height: i64,
    pub caught_up: bool,
    pub observed: usize,
    pub new: usize,
    pub blacklisted: usize,
    pub processed: usize,
    pub unavailable: usize,
    pub confirmed: usize,
}

pub struct Scanner {
    pool: SqlitePool,
    node: Arc<dyn NodeRpc>,
    workers: WorkerPool,
    blobs: Arc<dyn BlobStore>,
    config: Config,
    state: ScannerState,
    shutdown: CancellationToken,
}

impl Scanner {
    /// Load the checkpoint (creating it at genesis) and prepare the scan loop.
    pub async fn new(
        pool: SqlitePool,
        node: Arc<dyn NodeRpc>,
        blobs: Arc<dyn BlobStore>,
        config: Config,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        let checkpoint = checkpoint::load(&mut conn, config.genesis_height).await?;
        drop(conn);

        info!(
            "Loaded checkpoint: height {}, mempool {}, last mempool {}",
            checkpoint.height,
            checkpoint.mempool.len(),
            checkpoint.last_mempool.len()
        );

        let workers = WorkerPool::new(node.clone(), config.max_concurrency);
        debug!("Fetching with up to {} concurrent units", workers.max_concurrency());
        let state = ScannerState::from_checkpoint(checkpoint, config.catch_up_interval);

        Ok(Self {
            pool,
            node,
            workers,
            blobs,
            config,
            state,
            shutdown,
        })
    }

    pub async fn from_state(state: &AppState, shutdown: CancellationToken) -> Result<Self> {
        Self::new(
            state.db_pool.clone(),
            state.node.clone(),
            state.blob_store.clone(),
            state.config.clone(),
            shutdown,
        )
        .await
    }

    pub fn state(&self) -> &ScannerState {
        &self.state
    }

    /// Poll until shutdown. A failed cycle is rolled back and retried.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting chain scan from height {}", self.state.height);

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let delay = match self.run_cycle().await {
                Ok(report) => {
                    if report.processed > 0 || !report.caught_up {
                        info!(
                            "Indexed {} {} transactions ({} new, {} blacklisted, {} unavailable, {} confirmed)",
                            report.processed,
                            if report.caught_up { "mempool".to_string() } else { format!("block {}", report.height) },
                            report.new,
                            report.blacklisted,
                            report.unavailable,
                            report.confirmed
                        );
                    }
                    self.state.interval
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    error!("Scan cycle at height {} failed: {}", self.state.height, e);
                    self.config.rpc_retry_delay
                }
            };

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        info!("Chain scan stopped at height {}", self.state.height);
        Ok(())
    }

    /// Run one cycle: observe a block or the mempool, apply every new
    /// transaction, and persist the checkpoint in the same database transaction.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let tip = self.node.get_block_count().await?;
        let caught_up = tip < self.state.height;

        let (observed, ctx) = if caught_up {
            let mempool = self.node.get_raw_mempool().await?;
            let ctx = BlockContext {
                height: UNCONFIRMED_HEIGHT,
                timestamp: Utc::now().timestamp(),
            };
            (mempool, ctx)
        } else {
            let block = self.node.get_block_by_height(self.state.height).await?;
            let ctx = BlockContext {
                height: self.state.height,
                timestamp: block.time,
            };
            (block.tx, ctx)
        };

        debug!(
            "Cycle at height {} (tip {}, caught up {}): {} transactions observed",
            self.state.height,
            tip,
            caught_up,
            observed.len()
        );

        let new = self.state.new_transactions(&observed);
        let blacklist = Blacklist::load(&self.config.blacklist_path).await?;

        let mut handled = Vec::with_capacity(new.len());
        let mut to_fetch = Vec::with_capacity(new.len());
        let mut blacklisted = 0;
        for txid in &new {
            if blacklist.contains(txid) {
                info!("Skipping blacklisted transaction {}", txid);
                handled.push(txid.clone());
                blacklisted += 1;
            } else {
                to_fetch.push(txid.clone());
            }
        }

        let results = self.workers.fetch_all(&to_fetch, self.config.record_history).await;

        let mut fetched = Vec::with_capacity(results.len());
        let mut unavailable = 0;
        for (txid, result) in to_fetch.iter().zip(results) {
            match result {
                Ok(tx) => {
                    handled.push(txid.clone());
                    fetched.push(tx);
                }
                // Mempool transactions can vanish between listing and fetching.
                Err(RpcError::Node { code, message }) if caught_up => {
                    warn!("Mempool transaction {} unavailable ({}: {}); retrying next cycle", txid, code, message);
                    unavailable += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut tx = self.pool.begin().await?;

        for item in &fetched {
            process_transaction(&mut tx, self.blobs.as_ref(), item, &ctx, self.config.record_history).await?;
        }

        let mut confirmed = 0;
        if !caught_up && self.config.record_history {
            for txid in observed.iter().filter(|txid| self.state.in_window(txid)) {
                if history::confirm_transaction(&mut tx, txid, ctx.height, ctx.timestamp).await? {
                    confirmed += 1;
                }
            }
        }

        let next = self.state.next_checkpoint(caught_up, &handled);
        checkpoint::save(&mut tx, &next).await?;
        tx.commit().await?;

        let interval = if caught_up {
            self.config.tip_interval
        } else {
            self.config.catch_up_interval
        };
        self.state.advance(next, interval);

        Ok(CycleReport {
            height: ctx.height,
            caught_up,
            observed: observed.len(),
            new: new.len(),
            blacklisted,
            processed: fetched.len(),
            unavailable,
            confirmed,
        })
    }
}

/// Build a scanner from shared state and run it until `shutdown`.
pub async fn start_polling(state: Arc<AppState>, shutdown: CancellationToken) -> Result<()> {
    let mut scanner = Scanner::from_state(&state, shutdown).await?;
    scanner.run().await
}
