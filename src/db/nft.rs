use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::models::{NftCollection, NftInstance, LP_SENTINEL};

/// New ownership state written by a transfer.
#[derive(Debug, Clone)]
pub struct NftTransfer<'a> {
    pub utxo_id: &'a str,
    pub code_balance: i64,
    pub holder_balance: i64,
    pub holder_address: &'a str,
    pub holder_script_hash: &'a str,
    pub timestamp: i64,
}

pub async fn get_collection(
    conn: &mut SqliteConnection,
    collection_id: &str,
) -> Result<Option<NftCollection>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM nft_collections WHERE collection_id = ?")
        .bind(collection_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|row| NftCollection {
        collection_id: row.get("collection_id"),
        name: row.get("collection_name"),
        symbol: row.get("collection_symbol"),
        attributes: row.get("collection_attributes"),
        description: row.get("collection_description"),
        supply: row.get("collection_supply"),
        creator_address: row.get("collection_creator_address"),
        creator_script_hash: row.get("collection_creator_script_hash"),
        create_timestamp: row.get("collection_create_timestamp"),
        icon: row.get("collection_icon"),
    }))
}

/// Returns false when the collection already exists.
pub async fn insert_collection(conn: &mut SqliteConnection, collection: &NftCollection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO nft_collections
        (collection_id, collection_name, collection_creator_address, collection_creator_script_hash,
         collection_symbol, collection_attributes, collection_description, collection_supply,
         collection_create_timestamp, collection_icon)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(collection_id) DO NOTHING
        "#,
    )
    .bind(&collection.collection_id)
    .bind(&collection.name)
    .bind(&collection.creator_address)
    .bind(&collection.creator_script_hash)
    .bind(&collection.symbol)
    .bind(&collection.attributes)
    .bind(&collection.description)
    .bind(collection.supply)
    .bind(collection.create_timestamp)
    .bind(&collection.icon)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_nft(conn: &mut SqliteConnection, contract_id: &str) -> Result<Option<NftInstance>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM nft_utxo_set WHERE nft_contract_id = ?")
        .bind(contract_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(nft_from_row))
}

pub async fn count_nfts(conn: &mut SqliteConnection, contract_id: &str) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM nft_utxo_set WHERE nft_contract_id = ?")
        .bind(contract_id)
        .fetch_one(&mut *conn)
        .await?
        .get::<i64, _>(0);
    Ok(count)
}

/// Contract id of the NFT currently held in an output of `utxo_id`.
pub async fn find_contract_by_utxo(
    conn: &mut SqliteConnection,
    utxo_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT nft_contract_id FROM nft_utxo_set WHERE nft_utxo_id = ? LIMIT 1")
        .bind(utxo_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.get("nft_contract_id")))
}

/// Whether an NFT held by the pool sentinel already sits in an output of `utxo_id`.
pub async fn holds_pool_nft(conn: &mut SqliteConnection, utxo_id: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM nft_utxo_set WHERE nft_utxo_id = ? AND nft_holder_address = ? LIMIT 1")
        .bind(utxo_id)
        .bind(LP_SENTINEL)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Returns false when the NFT already exists.
pub async fn insert_nft(conn: &mut SqliteConnection, nft: &NftInstance) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO nft_utxo_set
        (nft_contract_id, collection_id, collection_index, collection_name, nft_utxo_id,
         nft_code_balance, nft_p2pkh_balance, nft_name, nft_symbol, nft_attributes, nft_description,
         nft_transfer_time_count, nft_holder_address, nft_holder_script_hash, nft_create_timestamp,
         nft_last_transfer_timestamp, nft_icon)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(nft_contract_id) DO NOTHING
        "#,
    )
    .bind(&nft.contract_id)
    .bind(&nft.collection_id)
    .bind(nft.collection_index)
    .bind(&nft.collection_name)
    .bind(&nft.utxo_id)
    .bind(nft.code_balance)
    .bind(nft.holder_balance)
    .bind(&nft.name)
    .bind(&nft.symbol)
    .bind(&nft.attributes)
    .bind(&nft.description)
    .bind(nft.transfer_count)
    .bind(&nft.holder_address)
    .bind(&nft.holder_script_hash)
    .bind(nft.create_timestamp)
    .bind(nft.last_transfer_timestamp)
    .bind(&nft.icon)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move an NFT to a new output in place. Returns false when the NFT is
/// unknown or already sits in `transfer.utxo_id`.
pub async fn apply_transfer(
    conn: &mut SqliteConnection,
    contract_id: &str,
    transfer: &NftTransfer<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE nft_utxo_set
        SET nft_utxo_id = ?, nft_code_balance = ?, nft_p2pkh_balance = ?, nft_holder_address = ?,
            nft_holder_script_hash = ?, nft_last_transfer_timestamp = ?,
            nft_transfer_time_count = nft_transfer_time_count + 1
        WHERE nft_contract_id = ? AND nft_utxo_id <> ?
        "#,
    )
    .bind(transfer.utxo_id)
    .bind(transfer.code_balance)
    .bind(transfer.holder_balance)
    .bind(transfer.holder_address)
    .bind(transfer.holder_script_hash)
    .bind(transfer.timestamp)
    .bind(contract_id)
    .bind(transfer.utxo_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn nft_from_row(row: &SqliteRow) -> NftInstance {
    NftInstance {
        contract_id: row.get("nft_contract_id"),
        utxo_id: row.get("nft_utxo_id"),
        collection_id: row.get("collection_id"),
        collection_index: row.get("collection_index"),
        collection_name: row.get("collection_name"),
        code_balance: row.get("nft_code_balance"),
        holder_balance: row.get("nft_p2pkh_balance"),
        name: row.get("nft_name"),
        symbol: row.get("nft_symbol"),
        attributes: row.get("nft_attributes"),
        description: row.get("nft_description"),
        transfer_count: row.get("nft_transfer_time_count"),
        holder_address: row.get("nft_holder_address"),
        holder_script_hash: row.get("nft_holder_script_hash"),
        create_timestamp: row.get("nft_create_timestamp"),
        last_transfer_timestamp: row.get("nft_last_transfer_timestamp"),
        icon: row.get("nft_icon"),
    }
}
