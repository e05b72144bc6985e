// Runtime configuration, read once from the environment (and `.env` when present).
// Unset or unparsable values fall back to their defaults.

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GENESIS_HEIGHT: i64 = 862_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub node_rpc_url: String,
    pub node_rpc_user: String,
    pub node_rpc_password: String,
    pub rpc_timeout_secs: u64,
    pub rpc_retry_delay: Duration,
    pub rpc_max_retries: Option<usize>,
    pub rpc_rate_limit: Option<u32>,
    pub max_concurrency: usize,
    pub catch_up_interval: Duration,
    pub tip_interval: Duration,
    pub genesis_height: i64,
    pub blacklist_path: String,
    pub blob_dir: String,
    pub blob_base_url: String,
    pub tx_cache_ttl: Duration,
    pub tx_cache_capacity: u64,
    pub record_history: bool,
    pub reset_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:tbc_index.db".to_string(),
            node_rpc_url: "http://localhost:8332".to_string(),
            node_rpc_user: String::new(),
            node_rpc_password: String::new(),
            rpc_timeout_secs: 30,
            rpc_retry_delay: Duration::from_secs(5),
            rpc_max_retries: None,
            rpc_rate_limit: None,
            max_concurrency: num_cpus::get(),
            catch_up_interval: Duration::from_millis(0),
            tip_interval: Duration::from_secs(2),
            genesis_height: DEFAULT_GENESIS_HEIGHT,
            blacklist_path: "black_list.txt".to_string(),
            blob_dir: "./icons".to_string(),
            blob_base_url: "http://localhost/icons".to_string(),
            tx_cache_ttl: Duration::from_secs(300),
            tx_cache_capacity: 10_000,
            record_history: true,
            reset_on_start: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let node_rpc_url = env::var("NODE_RPC_URL").unwrap_or(defaults.node_rpc_url);
        let node_rpc_user = env::var("NODE_RPC_USER").unwrap_or_default();
        let node_rpc_password = env::var("NODE_RPC_PASSWORD").unwrap_or_default();
        let rpc_timeout_secs = parse_var("RPC_TIMEOUT_SECS").unwrap_or(defaults.rpc_timeout_secs);
        let rpc_retry_delay = parse_var("RPC_RETRY_DELAY_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.rpc_retry_delay);
        let rpc_max_retries = parse_var("RPC_MAX_RETRIES");
        let rpc_rate_limit = parse_var("RPC_RATE_LIMIT").filter(|limit: &u32| *limit > 0);
        let max_concurrency = parse_var("MAX_CONCURRENCY")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_concurrency);
        let catch_up_interval = parse_var("CATCH_UP_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.catch_up_interval);
        let tip_interval = parse_var("TIP_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.tip_interval);
        let genesis_height = parse_var("GENESIS_HEIGHT").unwrap_or(defaults.genesis_height);
        let blacklist_path = env::var("BLACKLIST_PATH").unwrap_or(defaults.blacklist_path);
        let blob_dir = env::var("BLOB_DIR").unwrap_or(defaults.blob_dir);
        let blob_base_url = env::var("BLOB_BASE_URL").unwrap_or(defaults.blob_base_url);
        let tx_cache_ttl = parse_var("TX_CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.tx_cache_ttl);
        let tx_cache_capacity = parse_var("TX_CACHE_CAPACITY").unwrap_or(defaults.tx_cache_capacity);
        let record_history = parse_var("RECORD_HISTORY").unwrap_or(defaults.record_history);
        let reset_on_start = parse_var("RESET_ON_START").unwrap_or(defaults.reset_on_start);

        Self {
            database_url,
            node_rpc_url,
            node_rpc_user,
            node_rpc_password,
            rpc_timeout_secs,
            rpc_retry_delay,
            rpc_max_retries,
            rpc_rate_limit,
            max_concurrency,
            catch_up_interval,
            tip_interval,
            genesis_height,
            blacklist_path,
            blob_dir,
            blob_base_url,
            tx_cache_ttl,
            tx_cache_capacity,
            record_history,
            reset_on_start,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
