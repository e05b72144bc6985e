mod nft_ledger_tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::blob::LocalBlobStore;
use crate::blockchain::client::{NodeRpc, RpcError};
use crate::blockchain::models::{BlockSummary, FetchedTransaction, RawTransaction, ScriptSig, TxInput, TxOutput};
use crate::db::connection;

/// Node double: blocks by height, a mempool, and a transaction map.
#[derive(Default)]
pub struct MockNode {
    inner: Mutex<MockChain>,
}

#[derive(Default)]
struct MockChain {
    tip: i64,
    blocks: HashMap<i64, BlockSummary>,
    mempool: Vec<String>,
    txs: HashMap<String, Arc<RawTransaction>>,
}

impl MockNode {
    pub fn new(tip: i64) -> Self {
        let node = Self::default();
        node.set_tip(tip);
        node
    }

    pub fn set_tip(&self, tip: i64) {
        self.inner.lock().unwrap().tip = tip;
    }

    pub fn add_tx(&self, tx: RawTransaction) {
        self.inner.lock().unwrap().txs.insert(tx.txid.clone(), Arc::new(tx));
    }

    pub fn add_block(&self, height: i64, time: i64, txids: &[&str]) {
        let block = BlockSummary {
            tx: txids.iter().map(|t| t.to_string()).collect(),
            time,
        };
        self.inner.lock().unwrap().blocks.insert(height, block);
    }

    pub fn set_mempool(&self, txids: &[&str]) {
        self.inner.lock().unwrap().mempool = txids.iter().map(|t| t.to_string()).collect();
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn get_block_count(&self) -> Result<i64, RpcError> {
        Ok(self.inner.lock().unwrap().tip)
    }

    async fn get_block_by_height(&self, height: i64) -> Result<BlockSummary, RpcError> {
        self.inner
            .lock()
            .unwrap()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| RpcError::Node {
                code: -8,
                message: "Block height out of range".to_string(),
            })
    }

    async fn get_raw_mempool(&self) -> Result<Vec<String>, RpcError> {
        Ok(self.inner.lock().unwrap().mempool.clone())
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<Arc<RawTransaction>, RpcError> {
        self.inner
            .lock()
            .unwrap()
            .txs
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::Node {
                code: -5,
                message: "No such mempool or blockchain transaction".to_string(),
            })
    }
}

pub async fn test_pool() -> SqlitePool {
    connection::in_memory().await.expect("in-memory database")
}

pub fn test_blobs(dir: &tempfile::TempDir) -> LocalBlobStore {
    LocalBlobStore::new(dir.path(), "http://cdn.test")
}

/// A 64-char txid made of one repeated byte.
pub fn txid(byte: u8) -> String {
    format!("{:02x}", byte).repeat(32)
}

/// An input spending `prev:vout` whose unlock script has `unlock_hex_len` hex chars.
pub fn spend(prev: &str, vout: u32, unlock_asm: &str, unlock_hex_len: usize) -> TxInput {
    TxInput {
        txid: Some(prev.to_string()),
        vout: Some(vout),
        script_sig: Some(ScriptSig {
            asm: unlock_asm.to_string(),
            hex: "a".repeat(unlock_hex_len),
        }),
        coinbase: None,
    }
}

/// An input spending an FT output.
pub fn ft_spend(prev: &str, vout: u32) -> TxInput {
    spend(prev, vout, "1 3044022000", 200)
}

pub fn coinbase_input() -> TxInput {
    TxInput {
        coinbase: Some("03a0290d".to_string()),
        ..TxInput::default()
    }
}

pub fn raw(txid: &str, vin: Vec<TxInput>, vout: Vec<TxOutput>) -> RawTransaction {
    RawTransaction {
        txid: txid.to_string(),
        vin,
        vout,
    }
}

/// A fetched transaction without resolved inputs.
pub fn fetched(tx: RawTransaction) -> FetchedTransaction {
    FetchedTransaction {
        tx: Arc::new(tx),
        prevouts: Vec::new(),
    }
}
