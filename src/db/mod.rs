pub mod checkpoint;
pub mod connection;
pub mod ft;
pub mod migration;
pub mod nft;
pub mod transaction;

pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS index_build_status (
        name TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS ft_tokens (
        ft_contract_id TEXT PRIMARY KEY,
        ft_code_script TEXT NOT NULL,
        ft_tape_script TEXT NOT NULL,
        ft_supply INTEGER NOT NULL,
        ft_decimal INTEGER NOT NULL,
        ft_name TEXT NOT NULL,
        ft_symbol TEXT NOT NULL,
        ft_description TEXT NOT NULL DEFAULT '',
        ft_origin_utxo TEXT NOT NULL,
        ft_creator_combine_script TEXT NOT NULL,
        ft_holders_count INTEGER NOT NULL DEFAULT 0,
        ft_icon_url TEXT NOT NULL DEFAULT '',
        ft_create_timestamp INTEGER NOT NULL,
        ft_token_price REAL NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_ft_tokens_origin ON ft_tokens(ft_origin_utxo)",
    r#"
    CREATE TABLE IF NOT EXISTS ft_balance (
        ft_contract_id TEXT NOT NULL,
        ft_holder_combine_script TEXT NOT NULL,
        ft_balance INTEGER NOT NULL,
        PRIMARY KEY (ft_contract_id, ft_holder_combine_script)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS ft_txo_set (
        utxo_txid TEXT NOT NULL,
        utxo_vout INTEGER NOT NULL,
        ft_holder_combine_script TEXT NOT NULL,
        ft_contract_id TEXT NOT NULL,
        utxo_balance INTEGER NOT NULL,
        ft_balance INTEGER NOT NULL,
        if_spend INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (utxo_txid, utxo_vout)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_ft_txo_holder ON ft_txo_set(ft_holder_combine_script, ft_contract_id)",
    r#"
    CREATE TABLE IF NOT EXISTS nft_collections (
        collection_id TEXT PRIMARY KEY,
        collection_name TEXT NOT NULL,
        collection_creator_address TEXT NOT NULL,
        collection_creator_script_hash TEXT NOT NULL,
        collection_symbol TEXT NOT NULL,
        collection_attributes TEXT NOT NULL,
        collection_description TEXT NOT NULL,
        collection_supply INTEGER NOT NULL,
        collection_create_timestamp INTEGER NOT NULL,
        collection_icon TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS nft_utxo_set (
        nft_contract_id TEXT PRIMARY KEY,
        collection_id TEXT NOT NULL,
        collection_index INTEGER NOT NULL,
        collection_name TEXT NOT NULL,
        nft_utxo_id TEXT NOT NULL,
        nft_code_balance INTEGER NOT NULL,
        nft_p2pkh_balance INTEGER NOT NULL,
        nft_name TEXT NOT NULL,
        nft_symbol TEXT NOT NULL,
        nft_attributes TEXT NOT NULL,
        nft_description TEXT NOT NULL,
        nft_transfer_time_count INTEGER NOT NULL DEFAULT 0,
        nft_holder_address TEXT NOT NULL,
        nft_holder_script_hash TEXT NOT NULL,
        nft_create_timestamp INTEGER NOT NULL,
        nft_last_transfer_timestamp INTEGER NOT NULL,
        nft_icon TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_nft_utxo_id ON nft_utxo_set(nft_utxo_id)",
    "CREATE INDEX IF NOT EXISTS idx_nft_collection ON nft_utxo_set(collection_id, collection_index)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        tx_hash TEXT PRIMARY KEY,
        fee TEXT NOT NULL,
        time_stamp INTEGER NOT NULL,
        utc_time TEXT NOT NULL,
        tx_type TEXT NOT NULL,
        block_height INTEGER NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS address_transactions (
        address TEXT NOT NULL,
        tx_hash TEXT NOT NULL,
        is_sender INTEGER NOT NULL,
        is_recipient INTEGER NOT NULL,
        balance_change TEXT NOT NULL,
        PRIMARY KEY (address, tx_hash)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_address_transactions_hash ON address_transactions(tx_hash)",
    r#"
    CREATE TABLE IF NOT EXISTS transaction_participants (
        tx_hash TEXT NOT NULL,
        address TEXT NOT NULL,
        role TEXT NOT NULL,
        PRIMARY KEY (tx_hash, address, role)
    )"#,
];

/// Tables emptied by a ledger reset, in deletion order.
pub const LEDGER_TABLES: &[&str] = &[
    "ft_tokens",
    "ft_balance",
    "ft_txo_set",
    "nft_collections",
    "nft_utxo_set",
    "transactions",
    "address_transactions",
    "transaction_participants",
];
