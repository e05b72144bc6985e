use serde::{Deserialize, Serialize};

/// Origin reference and holder address used for liquidity-pool outputs.
pub const LP_SENTINEL: &str = "LP";

/// Collection id recorded on NFTs minted outside any collection.
pub const NO_COLLECTION_ID: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
pub const NO_COLLECTION_NAME: &str = "NOCOLLECTION";

/// Block height recorded for transactions seen only in the mempool.
pub const UNCONFIRMED_HEIGHT: i64 = -1;

/// Character budgets of the stored string columns.
pub mod budget {
    pub const FT_NAME: usize = 64;
    pub const FT_SYMBOL: usize = 64;
    pub const FT_ORIGIN: usize = 72;
    pub const FT_HOLDER_SCRIPT: usize = 42;
    pub const ICON_URL: usize = 255;
    pub const COLLECTION_NAME: usize = 64;
    pub const COLLECTION_SYMBOL: usize = 64;
    pub const COLLECTION_CREATOR: usize = 64;
    pub const NFT_NAME: usize = 64;
    pub const NFT_SYMBOL: usize = 64;
    pub const NFT_HOLDER_ADDRESS: usize = 64;
    pub const NFT_HOLDER_SCRIPT_HASH: usize = 64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtToken {
    pub contract_id: String,
    pub code_script: String,
    pub tape_script: String,
    pub supply: i64,
    pub decimals: i64,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub origin_utxo: String,
    pub creator_script: String,
    pub holders_count: i64,
    pub icon_url: String,
    pub create_timestamp: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtBalance {
    pub contract_id: String,
    pub holder_script: String,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtTxo {
    pub utxo_txid: String,
    pub utxo_vout: i64,
    pub holder_script: String,
    pub contract_id: String,
    pub utxo_balance: i64,
    pub ft_balance: i64,
    pub spent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftCollection {
    pub collection_id: String,
    pub name: String,
    pub symbol: String,
    pub attributes: String,
    pub description: String,
    pub supply: i64,
    pub creator_address: String,
    pub creator_script_hash: String,
    pub create_timestamp: i64,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftInstance {
    pub contract_id: String,
    pub utxo_id: String,
    pub collection_id: String,
    pub collection_index: i64,
    pub collection_name: String,
    pub code_balance: i64,
    pub holder_balance: i64,
    pub name: String,
    pub symbol: String,
    pub attributes: String,
    pub description: String,
    pub transfer_count: i64,
    pub holder_address: String,
    pub holder_script_hash: String,
    pub create_timestamp: i64,
    pub last_transfer_timestamp: i64,
    pub icon: String,
}

/// Transaction category; the first detected kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    P2pkh,
    Tbc20,
    Tbc721,
    P2ms,
}

impl TxType {
    pub fn as_str(self) -> &'static str {
        match self {
            TxType::P2pkh => "P2PKH",
            TxType::Tbc20 => "TBC20",
            TxType::Tbc721 => "TBC721",
            TxType::P2ms => "P2MS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_hash: String,
    pub fee: String,
    pub timestamp: i64,
    pub utc_time: String,
    pub tx_type: TxType,
    pub block_height: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParticipation {
    pub address: String,
    pub is_sender: bool,
    pub is_recipient: bool,
    pub balance_change: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    Sender,
    Recipient,
}

impl ParticipantRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantRole::Sender => "sender",
            ParticipantRole::Recipient => "recipient",
        }
    }
}
