pub mod blacklist;
pub mod blob;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod protocol;
pub mod state;

#[cfg(test)]
pub mod tests;

pub use blockchain::worker_pool;
pub use db::{checkpoint, connection, migration};
pub use error::{IndexerError, Result};
