pub mod classifier;
pub mod decoder;
pub mod script;

use thiserror::Error;

pub use classifier::{classify, NftVariant, ScriptKind};

/// A protocol output group that could not be decoded.
///
/// These abort the current output group only; the transaction's remaining
/// outputs are still processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("output {index} is missing companion output {companion}")]
    MissingCompanion { index: usize, companion: usize },

    #[error("companion output {index} has an unexpected shape: {reason}")]
    UnexpectedCompanion { index: usize, reason: &'static str },

    #[error("invalid hex in {0}")]
    InvalidHex(&'static str),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid tape JSON: {0}")]
    InvalidJson(String),

    #[error("invalid amount segment {0:?}")]
    InvalidAmount(String),

    #[error("token amount overflows the ledger range")]
    AmountOverflow,

    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("legacy FT encoding is not indexed")]
    LegacyEncoding,

    #[error("unsupported NFT script variant")]
    UnsupportedNftVariant,

    #[error("collection supply must be positive, got {0}")]
    InvalidSupply(i64),

    #[error("cannot resolve transferred NFT: {0}")]
    UnresolvedTransfer(String),

    #[error("malformed multisig script")]
    MalformedMultisig,
}
