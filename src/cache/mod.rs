// Decoded-transaction cache backed by Moka

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::blockchain::models::RawTransaction;
use crate::config::Config;

#[derive(Clone)]
pub struct TransactionCache {
    cache: Cache<String, Arc<RawTransaction>>,
}

impl TransactionCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tx_cache_capacity, config.tx_cache_ttl)
    }

    pub async fn get(&self, txid: &str) -> Option<Arc<RawTransaction>> {
        let result = self.cache.get(txid).await;
        if result.is_some() {
            debug!("Cache hit for transaction {}", txid);
        }
        result
    }

    pub async fn insert(&self, tx: Arc<RawTransaction>) {
        self.cache.insert(tx.txid.clone(), tx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(txid: &str) -> Arc<RawTransaction> {
        Arc::new(RawTransaction {
            txid: txid.to_string(),
            vin: Vec::new(),
            vout: Vec::new(),
        })
    }

    #[tokio::test]
    async fn caches_by_txid() {
        let cache = TransactionCache::new(16, Duration::from_secs(60));
        assert!(cache.get("aa").await.is_none());

        cache.insert(raw("aa")).await;
        assert_eq!(cache.get("aa").await.map(|tx| tx.txid.clone()), Some("aa".to_string()));
        assert!(cache.get("ab").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = TransactionCache::new(16, Duration::from_millis(50));
        cache.insert(raw("bb")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get("bb").await.is_none());
    }
}
