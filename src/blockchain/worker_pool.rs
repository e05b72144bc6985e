use crate::blockchain::client::{NodeRpc, RpcError};
use crate::blockchain::models::{FetchedTransaction, Prevout};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Bounds how many transactions are fetched from the node at once.
///
/// Each unit holds one permit while it fetches a transaction and, when asked,
/// the outputs its inputs spend.
pub struct WorkerPool {
    node: Arc<dyn NodeRpc>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl WorkerPool {
    pub fn new(node: Arc<dyn NodeRpc>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            node,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Fetch every transaction in `txids` concurrently. Results keep the input order.
    pub async fn fetch_all(
        &self,
        txids: &[String],
        resolve_prevouts: bool,
    ) -> Vec<Result<FetchedTransaction, RpcError>> {
        let units = txids
            .iter()
            .map(|txid| self.fetch_one(txid, resolve_prevouts));
        let results = join_all(units).await;

        debug!(
            "Fetched {} transactions with up to {} concurrent units",
            results.len(),
            self.max_concurrency
        );
        results
    }

    async fn fetch_one(&self, txid: &str, resolve_prevouts: bool) -> Result<FetchedTransaction, RpcError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RpcError::Cancelled)?;

        let tx = self.node.get_raw_transaction(txid).await?;

        let mut prevouts = Vec::new();
        if resolve_prevouts {
            prevouts.reserve(tx.vin.len());
            for input in &tx.vin {
                let prevout = if input.is_coinbase() {
                    Prevout::Coinbase
                } else if let Some((prev_txid, vout)) = input.outpoint() {
                    self.resolve_prevout(txid, prev_txid, vout).await?
                } else {
                    warn!("Input of {} has no complete outpoint", txid);
                    Prevout::Missing
                };
                prevouts.push(prevout);
            }
        }

        Ok(FetchedTransaction { tx, prevouts })
    }

    async fn resolve_prevout(&self, txid: &str, prev_txid: &str, vout: u32) -> Result<Prevout, RpcError> {
        match self.node.get_raw_transaction(prev_txid).await {
            Ok(prev) => Ok(prev
                .vout
                .get(vout as usize)
                .cloned()
                .map(Prevout::Resolved)
                .unwrap_or(Prevout::Missing)),
            Err(RpcError::Node { code, message }) => {
                warn!(
                    "Input {}:{} of {} could not be resolved ({}: {})",
                    prev_txid, vout, txid, code, message
                );
                Ok(Prevout::Missing)
            }
            Err(e) => Err(e),
        }
    }
}
