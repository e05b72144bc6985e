pub mod client;
pub mod models;
pub mod polling;
pub mod processor;
pub mod worker_pool;

pub use client::{NodeRpc, RpcClient, RpcError};
pub use polling::{start_polling, Scanner, ScannerState};
pub use processor::{process_transaction, BlockContext};
