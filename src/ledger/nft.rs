use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::blob::{mirror_icon, BlobStore};
use crate::blockchain::models::RawTransaction;
use crate::db;
use crate::db::nft::NftTransfer;
use crate::error::Result;
use crate::models::{budget, NftCollection, NftInstance, NO_COLLECTION_ID, NO_COLLECTION_NAME};
use crate::protocol::decoder::{decode_collection, decode_nft, NftOutput};
use crate::protocol::script::truncate_chars;
use crate::protocol::{DecodeError, NftVariant, ScriptKind};

/// Unlock scripts longer than this (hex chars) carry a transfer certificate.
const TRANSFER_UNLOCK_HEX_LEN: usize = 500;

/// Length of an icon or transfer reference pointing at another NFT output.
const REFERENCE_LEN: usize = 72;
const CONTRACT_ID_LEN: usize = 64;

/// Index a collection mint at `index`. Returns the number of output slots the
/// collection reserves, which is its supply.
pub async fn index_collection(
    conn: &mut SqliteConnection,
    blobs: &dyn BlobStore,
    tx: &RawTransaction,
    index: usize,
    timestamp: i64,
) -> Result<usize> {
    let decoded = decode_collection(tx, index)?;
    let reserved = usize::try_from(decoded.tape.supply).unwrap_or(usize::MAX);

    if db::nft::get_collection(conn, &tx.txid).await?.is_some() {
        debug!("Collection {} already indexed", tx.txid);
        return Ok(reserved);
    }

    let icon = mirror_icon(blobs, &decoded.tape.icon, &format!("collections/{}.jpg", tx.txid)).await;
    let collection = NftCollection {
        collection_id: tx.txid.clone(),
        name: decoded.tape.name,
        symbol: decoded.tape.symbol,
        attributes: decoded.tape.attributes,
        description: decoded.tape.description,
        supply: decoded.tape.supply,
        creator_address: decoded.creator_address,
        creator_script_hash: decoded.creator_script_hash,
        create_timestamp: timestamp,
        icon: truncate_chars(&icon, budget::ICON_URL),
    };

    if db::nft::insert_collection(conn, &collection).await? {
        info!(
            "NFT collection: {} {} supply {}",
            tx.txid, collection.name, collection.supply
        );
    }
    Ok(reserved)
}

/// Index an NFT group at `index` as a mint or a transfer. Returns the group width.
pub async fn index_nft(
    conn: &mut SqliteConnection,
    blobs: &dyn BlobStore,
    tx: &RawTransaction,
    index: usize,
    variant: NftVariant,
    timestamp: i64,
) -> Result<usize> {
    let nft = decode_nft(tx, index, variant)?;

    if is_transfer(tx) {
        transfer(conn, tx, &nft, timestamp).await?;
    } else {
        mint(conn, blobs, tx, nft, timestamp).await?;
    }

    Ok(ScriptKind::Nft(variant).group_width())
}

fn is_transfer(tx: &RawTransaction) -> bool {
    tx.vin
        .first()
        .map(|input| input.unlock_hex().len() > TRANSFER_UNLOCK_HEX_LEN)
        .unwrap_or(false)
}

async fn transfer(conn: &mut SqliteConnection, tx: &RawTransaction, nft: &NftOutput, timestamp: i64) -> Result<()> {
    let contract_id = match nft.variant {
        NftVariant::Pool => {
            // Pool NFTs carry no id; follow the output the first input spends.
            let prev_txid = tx
                .vin
                .first()
                .and_then(|input| input.txid.as_deref())
                .ok_or_else(|| DecodeError::UnresolvedTransfer("first input spends nothing".to_string()))?;

            match db::nft::find_contract_by_utxo(conn, prev_txid).await? {
                Some(contract_id) => contract_id,
                None => {
                    if db::nft::holds_pool_nft(conn, &tx.txid).await? {
                        debug!("Pool NFT already moved to {}", tx.txid);
                        return Ok(());
                    }
                    return Err(DecodeError::UnresolvedTransfer(format!("no NFT held in {}", prev_txid)).into());
                }
            }
        }
        _ => {
            if nft.tape.file.chars().count() != REFERENCE_LEN {
                return Err(DecodeError::UnresolvedTransfer(format!(
                    "transfer reference has {} characters",
                    nft.tape.file.chars().count()
                ))
                .into());
            }
            truncate_chars(&nft.tape.file, CONTRACT_ID_LEN)
        }
    };

    let update = NftTransfer {
        utxo_id: &tx.txid,
        code_balance: nft.code_balance,
        holder_balance: nft.holder_balance,
        holder_address: &nft.holder_address,
        holder_script_hash: &nft.holder_script_hash,
        timestamp,
    };

    if db::nft::apply_transfer(conn, &contract_id, &update).await? {
        info!("NFT transfer: {} -> {}", contract_id, tx.txid);
    } else {
        debug!("NFT transfer {} of {} is unknown or already applied", tx.txid, contract_id);
    }
    Ok(())
}

async fn mint(
    conn: &mut SqliteConnection,
    blobs: &dyn BlobStore,
    tx: &RawTransaction,
    nft: NftOutput,
    timestamp: i64,
) -> Result<()> {
    if db::nft::get_nft(conn, &tx.txid).await?.is_some() {
        debug!("NFT {} already minted", tx.txid);
        return Ok(());
    }

    let mut collection_id = NO_COLLECTION_ID.to_string();
    let mut collection_index = 0;
    let mut collection_name = NO_COLLECTION_NAME.to_string();
    let mut collection_icon = String::new();

    // First input spending a reserved slot of a known collection wins.
    for input in &tx.vin {
        let Some((prev_txid, prev_vout)) = input.outpoint() else {
            continue;
        };
        let Some(collection) = db::nft::get_collection(conn, prev_txid).await? else {
            continue;
        };
        if i64::from(prev_vout) <= collection.supply {
            collection_id = collection.collection_id;
            collection_index = i64::from(prev_vout);
            collection_name = collection.name;
            collection_icon = collection.icon;
            break;
        }
    }

    let icon = if nft.tape.file.chars().count() == REFERENCE_LEN {
        collection_icon
    } else {
        mirror_icon(blobs, &nft.tape.file, &format!("nfts/{}.jpg", tx.txid)).await
    };

    let instance = NftInstance {
        contract_id: tx.txid.clone(),
        utxo_id: tx.txid.clone(),
        collection_id,
        collection_index,
        collection_name,
        code_balance: nft.code_balance,
        holder_balance: nft.holder_balance,
        name: nft.tape.name,
        symbol: nft.tape.symbol,
        attributes: nft.tape.attributes,
        description: nft.tape.description,
        transfer_count: 0,
        holder_address: nft.holder_address,
        holder_script_hash: nft.holder_script_hash,
        create_timestamp: timestamp,
        last_transfer_timestamp: timestamp,
        icon: truncate_chars(&icon, budget::ICON_URL),
    };

    if db::nft::insert_nft(conn, &instance).await? {
        info!(
            "NFT mint: {} in {} #{}",
            instance.contract_id, instance.collection_name, instance.collection_index
        );
    }
    Ok(())
}
