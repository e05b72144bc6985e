// Ledger engines. Each function takes the cycle's open connection so every
// mutation commits or rolls back with the checkpoint.

pub mod ft;
pub mod history;
pub mod nft;
