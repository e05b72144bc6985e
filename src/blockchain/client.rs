use crate::blockchain::models::{BlockSummary, RawTransaction};
use crate::cache::TransactionCache;
use crate::config::Config;
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("cancelled")]
    Cancelled,
}

impl RpcError {
    /// Transient failures are retried; node-reported errors and cancellation are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport(_) | RpcError::Malformed(_))
    }
}

/// The node capabilities the indexer consumes. All lookups are verbose (decoded JSON).
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn get_block_count(&self) -> Result<i64, RpcError>;

    async fn get_block_by_height(&self, height: i64) -> Result<BlockSummary, RpcError>;

    async fn get_raw_mempool(&self) -> Result<Vec<String>, RpcError>;

    async fn get_raw_transaction(&self, txid: &str) -> Result<Arc<RawTransaction>, RpcError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries until cancelled.
    pub max_attempts: Option<usize>,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delay: config.rpc_retry_delay,
            max_attempts: config.rpc_max_retries,
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_attempts.unwrap_or(usize::MAX))
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC 1.0 client for the chain node.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    user: String,
    password: String,
    retry: RetryPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
    cache: TransactionCache,
    shutdown: CancellationToken,
}

impl RpcClient {
    pub fn new(config: &Config, cache: TransactionCache, shutdown: CancellationToken) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()?;

        let limiter = config
            .rpc_rate_limit
            .and_then(NonZeroU32::new)
            .map(|per_second| RateLimiter::direct(Quota::per_second(per_second)));

        info!(
            "Initializing node RPC client for {} (retry delay {:?}, rate limit {:?})",
            config.node_rpc_url, config.rpc_retry_delay, config.rpc_rate_limit
        );

        Ok(Self {
            http,
            url: config.node_rpc_url.clone(),
            user: config.node_rpc_user.clone(),
            password: config.node_rpc_password.clone(),
            retry: RetryPolicy::from_config(config),
            limiter,
            cache,
            shutdown,
        })
    }

    /// Call `method`, retrying transient failures until success, the retry cap, or shutdown.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let attempt = || self.send::<T>(method, &params);
        let retrying = attempt
            .retry(self.retry.backoff())
            .when(RpcError::is_transient)
            .notify(|err: &RpcError, delay: Duration| {
                warn!("RPC {} failed: {}; retrying in {:?}", method, err, delay);
            });

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(RpcError::Cancelled),
            result = retrying => result,
        }
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T, RpcError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        debug!("RPC {} {}", method, params);

        let body = RpcRequest {
            jsonrpc: "1.0",
            id: "tbc-token-indexer",
            method,
            params,
        };
        let mut request = self.http.post(&self.url).json(&body);
        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        // The node reports RPC errors with HTTP 500 and a JSON body, so parse regardless of status.
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let parsed: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| RpcError::Malformed(format!("HTTP {}: {}", status, e)))?;

        if let Some(error) = parsed.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(parsed.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::Malformed(format!("{}: {}", method, e)))
    }
}

#[async_trait]
impl NodeRpc for RpcClient {
    async fn get_block_count(&self) -> Result<i64, RpcError> {
        self.call("getblockcount", json!([])).await
    }

    async fn get_block_by_height(&self, height: i64) -> Result<BlockSummary, RpcError> {
        self.call("getblockbyheight", json!([height, 1])).await
    }

    async fn get_raw_mempool(&self) -> Result<Vec<String>, RpcError> {
        self.call("getrawmempool", json!([])).await
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<Arc<RawTransaction>, RpcError> {
        if let Some(tx) = self.cache.get(txid).await {
            return Ok(tx);
        }

        let tx: RawTransaction = self.call("getrawtransaction", json!([txid, 1])).await?;
        let tx = Arc::new(tx);
        self.cache.insert(tx.clone()).await;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RpcError::Malformed("x".into()).is_transient());
        assert!(!RpcError::Cancelled.is_transient());
        assert!(!RpcError::Node {
            code: -5,
            message: "No such mempool or blockchain transaction".into()
        }
        .is_transient());
    }

    #[test]
    fn parses_node_error_body() {
        let parsed: RpcResponse = serde_json::from_str(
            r#"{"result":null,"error":{"code":-8,"message":"Block height out of range"},"id":"x"}"#,
        )
        .unwrap();
        let error = parsed.error.unwrap();
        assert_eq!(error.code, -8);
        assert_eq!(error.message, "Block height out of range");
    }

    #[tokio::test]
    async fn cancellation_stops_retries() {
        let mut config = Config::default();
        // Nothing listens here, so every attempt is a transport failure.
        config.node_rpc_url = "http://127.0.0.1:9".to_string();
        config.rpc_retry_delay = Duration::from_millis(10);
        config.rpc_timeout_secs = 1;

        let shutdown = CancellationToken::new();
        let client = RpcClient::new(
            &config,
            TransactionCache::new(8, Duration::from_secs(1)),
            shutdown.clone(),
        )
        .unwrap();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = client.get_block_count().await;
        assert!(matches!(result, Err(RpcError::Cancelled)));
    }

    #[tokio::test]
    async fn retry_cap_surfaces_last_error() {
        let mut config = Config::default();
        config.node_rpc_url = "http://127.0.0.1:9".to_string();
        config.rpc_retry_delay = Duration::from_millis(1);
        config.rpc_max_retries = Some(2);
        config.rpc_timeout_secs = 1;

        let client = RpcClient::new(
            &config,
            TransactionCache::new(8, Duration::from_secs(1)),
            CancellationToken::new(),
        )
        .unwrap();

        assert!(matches!(client.get_raw_mempool().await, Err(RpcError::Transport(_))));
    }
}
