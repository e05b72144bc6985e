use crate::blob::BlobStore;
use crate::blockchain::client::NodeRpc;
use crate::config::Config;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub node: Arc<dyn NodeRpc>,
    pub blob_store: Arc<dyn BlobStore>,
}
