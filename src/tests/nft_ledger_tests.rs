use crate::blockchain::processor::{process_transaction, BlockContext};
use crate::db::{ft, nft};
use crate::models::{NO_COLLECTION_ID, NO_COLLECTION_NAME};
use crate::protocol::decoder::fixtures::{ft_code, ft_tape, json_tape, out, p2pkh};

use super::*;

const MINT_CTX: BlockContext = BlockContext {
    height: 900_000,
    timestamp: 1_700_000_000,
};

const TRANSFER_CTX: BlockContext = BlockContext {
    height: 900_010,
    timestamp: 1_700_006_000,
};

const ICON: &str = "data:image/png;base64,AAAA";

fn short_unlock(prev: &str, vout: u32) -> TxInput {
    spend(prev, vout, "3044022000 02aa", 200)
}

fn transfer_unlock(prev: &str, vout: u32) -> TxInput {
    spend(prev, vout, "3044022000 02aa", 600)
}

fn standard_code() -> TxOutput {
    out("1 OP_PICK 3 OP_SPLIT 20 OP_SPLIT", "51", 0.0002)
}

fn pool_code() -> TxOutput {
    out("1 OP_PICK 3 OP_SPLIT OP_NIP 20 OP_SPLIT", "51", 0.0001)
}

fn pool_holder() -> TxOutput {
    out("OP_DUP OP_HASH160 x OP_EQUALVERIFY poolref OP_DROP", "52", 0.0)
}

fn collection_tape(supply: i64) -> TxOutput {
    json_tape(&format!(
        r#"{{"collectionName":"Apes","symbol":"APE","description":"bored","supply":{supply},"file":"{ICON}"}}"#
    ))
}

fn nft_tape(name: &str, file: &str) -> TxOutput {
    json_tape(&format!(
        r#"{{"nftName":"{name}","symbol":"APE","attributes":[1,2],"description":"","file":"{file}"}}"#
    ))
}

fn collection_tx(id: &str, supply: i64, rest: Vec<TxOutput>) -> RawTransaction {
    let mut vout = vec![collection_tape(supply), p2pkh("1Creator", 0.000001)];
    vout.extend(rest);
    raw(id, vec![short_unlock(&txid(0xf0), 0)], vout)
}

#[tokio::test]
async fn nft_transfer_keeps_identity() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = test_blobs(&dir);
    let mut conn = pool.acquire().await.unwrap();

    let minted = txid(0x21);
    let mint = raw(
        &minted,
        vec![short_unlock(&txid(0xf1), 0)],
        vec![standard_code(), p2pkh("1Holder", 0.000003), nft_tape("Solo", ICON)],
    );
    process_transaction(&mut conn, &blobs, &fetched(mint), &MINT_CTX, false)
        .await
        .unwrap();

    let instance = nft::get_nft(&mut conn, &minted).await.unwrap().unwrap();
    assert_eq!(instance.utxo_id, minted);
    assert_eq!(instance.collection_id, NO_COLLECTION_ID);
    assert_eq!(instance.collection_name, NO_COLLECTION_NAME);
    assert_eq!(instance.holder_address, "1Holder");
    assert_eq!(instance.attributes, "[1,2]");
    assert_eq!(instance.code_balance, 200);
    assert_eq!(instance.icon, format!("http://cdn.test/nfts/{minted}.jpg"));
    assert_eq!(instance.transfer_count, 0);

    let moved = txid(0x22);
    let transfer = raw(
        &moved,
        vec![transfer_unlock(&minted, 0)],
        vec![
            standard_code(),
            p2pkh("1Buyer", 0.000003),
            nft_tape("Solo", &format!("{minted}00000000")),
        ],
    );
    for _ in 0..2 {
        process_transaction(&mut conn, &blobs, &fetched(transfer.clone()), &TRANSFER_CTX, false)
            .await
            .unwrap();
    }

    assert_eq!(nft::count_nfts(&mut conn, &minted).await.unwrap(), 1);
    assert!(nft::get_nft(&mut conn, &moved).await.unwrap().is_none());
    let instance = nft::get_nft(&mut conn, &minted).await.unwrap().unwrap();
    assert_eq!(instance.utxo_id, moved);
    assert_eq!(instance.transfer_count, 1);
    assert_eq!(instance.holder_address, "1Buyer");
    assert_eq!(instance.create_timestamp, MINT_CTX.timestamp);
    assert_eq!(instance.last_transfer_timestamp, TRANSFER_CTX.timestamp);
}

#[tokio::test]
async fn pool_nft_follows_its_previous_output() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = test_blobs(&dir);
    let mut conn = pool.acquire().await.unwrap();

    let created = txid(0x31);
    let mint = raw(&created, vec![short_unlock(&txid(0xf1), 0)], vec![pool_code(), pool_holder()]);
    process_transaction(&mut conn, &blobs, &fetched(mint), &MINT_CTX, false)
        .await
        .unwrap();

    let instance = nft::get_nft(&mut conn, &created).await.unwrap().unwrap();
    assert_eq!(instance.holder_address, "LP");
    assert_eq!(instance.icon, "poolref");

    let moved = txid(0x32);
    let transfer = raw(&moved, vec![transfer_unlock(&created, 0)], vec![pool_code(), pool_holder()]);
    for _ in 0..2 {
        process_transaction(&mut conn, &blobs, &fetched(transfer.clone()), &TRANSFER_CTX, false)
            .await
            .unwrap();
    }

    let instance = nft::get_nft(&mut conn, &created).await.unwrap().unwrap();
    assert_eq!(instance.utxo_id, moved);
    assert_eq!(instance.transfer_count, 1);
    assert_eq!(nft::find_contract_by_utxo(&mut conn, &moved).await.unwrap(), Some(created));
}

#[tokio::test]
async fn unresolved_pool_transfer_is_skipped() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = test_blobs(&dir);
    let mut conn = pool.acquire().await.unwrap();

    let orphan = raw(&txid(0x33), vec![transfer_unlock(&txid(0x99), 0)], vec![pool_code(), pool_holder()]);
    let stats = process_transaction(&mut conn, &blobs, &fetched(orphan), &TRANSFER_CTX, false)
        .await
        .unwrap();

    assert_eq!(stats.groups_skipped, 1);
    assert!(nft::get_nft(&mut conn, &txid(0x33)).await.unwrap().is_none());
}

#[tokio::test]
async fn pool_and_standard_nft_move_in_one_transaction() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = test_blobs(&dir);
    let mut conn = pool.acquire().await.unwrap();

    let pooled = txid(0x61);
    let mint = raw(&pooled, vec![short_unlock(&txid(0xf1), 0)], vec![pool_code(), pool_holder()]);
    process_transaction(&mut conn, &blobs, &fetched(mint), &MINT_CTX, false)
        .await
        .unwrap();

    let standard = txid(0x62);
    let mint = raw(
        &standard,
        vec![short_unlock(&txid(0xf2), 0)],
        vec![standard_code(), p2pkh("1Holder", 0.000003), nft_tape("Solo", ICON)],
    );
    process_transaction(&mut conn, &blobs, &fetched(mint), &MINT_CTX, false)
        .await
        .unwrap();

    // The standard group lands in `moved` first; the pool NFT must still follow vin[0].
    let moved = txid(0x63);
    let transfer = raw(
        &moved,
        vec![transfer_unlock(&pooled, 0), transfer_unlock(&standard, 0)],
        vec![
            standard_code(),
            p2pkh("1Buyer", 0.000003),
            nft_tape("Solo", &format!("{standard}00000000")),
            pool_code(),
            pool_holder(),
        ],
    );
    for _ in 0..2 {
        let stats = process_transaction(&mut conn, &blobs, &fetched(transfer.clone()), &TRANSFER_CTX, false)
            .await
            .unwrap();
        assert_eq!((stats.groups_indexed, stats.groups_skipped), (2, 0));
    }

    let instance = nft::get_nft(&mut conn, &standard).await.unwrap().unwrap();
    assert_eq!(instance.utxo_id, moved);
    assert_eq!(instance.transfer_count, 1);
    assert_eq!(instance.holder_address, "1Buyer");

    let instance = nft::get_nft(&mut conn, &pooled).await.unwrap().unwrap();
    assert_eq!(instance.utxo_id, moved);
    assert_eq!(instance.transfer_count, 1);
    assert_eq!(instance.holder_address, "LP");
    assert_eq!(instance.last_transfer_timestamp, TRANSFER_CTX.timestamp);
}

#[tokio::test]
async fn collection_mint_and_affiliated_nft() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = test_blobs(&dir);
    let mut conn = pool.acquire().await.unwrap();

    let collection_id = txid(0x41);
    process_transaction(&mut conn, &blobs, &fetched(collection_tx(&collection_id, 5, vec![])), &MINT_CTX, false)
        .await
        .unwrap();

    let collection = nft::get_collection(&mut conn, &collection_id).await.unwrap().unwrap();
    assert_eq!(collection.name, "Apes");
    assert_eq!(collection.supply, 5);
    assert_eq!(collection.creator_address, "1Creator");
    let mirrored = format!("http://cdn.test/collections/{collection_id}.jpg");
    assert_eq!(collection.icon, mirrored);

    let minted = txid(0x42);
    let mint = raw(
        &minted,
        vec![short_unlock(&collection_id, 2)],
        vec![
            standard_code(),
            p2pkh("1Holder", 0.000003),
            nft_tape("Ape #2", &format!("{collection_id}02000000")),
        ],
    );
    process_transaction(&mut conn, &blobs, &fetched(mint), &MINT_CTX, false)
        .await
        .unwrap();

    let instance = nft::get_nft(&mut conn, &minted).await.unwrap().unwrap();
    assert_eq!(instance.collection_id, collection_id);
    assert_eq!(instance.collection_index, 2);
    assert_eq!(instance.collection_name, "Apes");
    assert_eq!(instance.name, "Ape #2");
    assert_eq!(instance.icon, mirrored);
}

#[tokio::test]
async fn collection_reserves_exactly_its_supply() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = test_blobs(&dir);
    let mut conn = pool.acquire().await.unwrap();

    // supply 1: the creator output is the only reserved slot.
    let single = txid(0x51);
    let tx = collection_tx(
        &single,
        1,
        vec![ft_code(&"0d".repeat(36), &"aa".repeat(21)), ft_tape(10, 0, "One", "ONE")],
    );
    let stats = process_transaction(&mut conn, &blobs, &fetched(tx), &MINT_CTX, false)
        .await
        .unwrap();
    assert_eq!((stats.groups_indexed, stats.groups_skipped), (2, 0));
    assert!(ft::get_token(&mut conn, &single).await.unwrap().is_some());

    // supply 4: the undecodable tapes at 2 and 3 are never visited.
    let four = txid(0x52);
    let trap = || json_tape("not json");
    let tx = collection_tx(
        &four,
        4,
        vec![trap(), trap(), ft_code(&"0e".repeat(36), &"aa".repeat(21)), ft_tape(10, 0, "Four", "FOR")],
    );
    let stats = process_transaction(&mut conn, &blobs, &fetched(tx), &MINT_CTX, false)
        .await
        .unwrap();
    assert_eq!((stats.groups_indexed, stats.groups_skipped), (2, 0));
    assert_eq!(ft::get_token(&mut conn, &four).await.unwrap().unwrap().symbol, "FOR");

    // A supply past the last output ends the walk.
    let huge = txid(0x53);
    let tx = collection_tx(
        &huge,
        1_000_000_000,
        vec![ft_code(&"0f".repeat(36), &"aa".repeat(21)), ft_tape(10, 0, "Huge", "HUG")],
    );
    let stats = process_transaction(&mut conn, &blobs, &fetched(tx), &MINT_CTX, false)
        .await
        .unwrap();
    assert_eq!((stats.groups_indexed, stats.groups_skipped), (1, 0));
    assert!(ft::get_token(&mut conn, &huge).await.unwrap().is_none());
    assert_eq!(nft::get_collection(&mut conn, &huge).await.unwrap().unwrap().supply, 1_000_000_000);
}
