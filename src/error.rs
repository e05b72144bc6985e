use thiserror::Error;

use crate::blob::BlobError;
use crate::blockchain::client::RpcError;
use crate::protocol::DecodeError;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("node RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("protocol decode error: {0}")]
    Protocol(#[from] DecodeError),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),
}

impl IndexerError {
    /// Shutdown was requested while the operation was in flight.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IndexerError::Rpc(RpcError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
