use sqlx::{Row, SqliteConnection};

use crate::models::{AddressParticipation, ParticipantRole, TransactionRecord, TxType};

pub async fn upsert_transaction(conn: &mut SqliteConnection, record: &TransactionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transactions (tx_hash, fee, time_stamp, utc_time, tx_type, block_height)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(tx_hash) DO UPDATE SET
            fee = excluded.fee,
            time_stamp = excluded.time_stamp,
            utc_time = excluded.utc_time,
            tx_type = excluded.tx_type,
            block_height = excluded.block_height
        "#,
    )
    .bind(&record.tx_hash)
    .bind(&record.fee)
    .bind(record.timestamp)
    .bind(&record.utc_time)
    .bind(record.tx_type.as_str())
    .bind(record.block_height)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_transaction(
    conn: &mut SqliteConnection,
    tx_hash: &str,
) -> Result<Option<TransactionRecord>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM transactions WHERE tx_hash = ?")
        .bind(tx_hash)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|row| {
        let tx_type = match row.get::<String, _>("tx_type").as_str() {
            "TBC20" => TxType::Tbc20,
            "TBC721" => TxType::Tbc721,
            "P2MS" => TxType::P2ms,
            _ => TxType::P2pkh,
        };
        TransactionRecord {
            tx_hash: row.get("tx_hash"),
            fee: row.get("fee"),
            timestamp: row.get("time_stamp"),
            utc_time: row.get("utc_time"),
            tx_type,
            block_height: row.get("block_height"),
        }
    }))
}

/// Stamp a transaction first recorded from the mempool with its block.
/// Returns false when there is no unconfirmed record for `tx_hash`.
pub async fn confirm_transaction(
    conn: &mut SqliteConnection,
    tx_hash: &str,
    block_height: i64,
    timestamp: i64,
    utc_time: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET block_height = ?, time_stamp = ?, utc_time = ? WHERE tx_hash = ? AND block_height < 1",
    )
    .bind(block_height)
    .bind(timestamp)
    .bind(utc_time)
    .bind(tx_hash)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn upsert_participation(
    conn: &mut SqliteConnection,
    tx_hash: &str,
    participation: &AddressParticipation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO address_transactions (address, tx_hash, is_sender, is_recipient, balance_change)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(address, tx_hash) DO UPDATE SET
            is_sender = excluded.is_sender,
            is_recipient = excluded.is_recipient,
            balance_change = excluded.balance_change
        "#,
    )
    .bind(&participation.address)
    .bind(tx_hash)
    .bind(participation.is_sender)
    .bind(participation.is_recipient)
    .bind(&participation.balance_change)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list_participation(
    conn: &mut SqliteConnection,
    tx_hash: &str,
) -> Result<Vec<AddressParticipation>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM address_transactions WHERE tx_hash = ? ORDER BY address")
        .bind(tx_hash)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .iter()
        .map(|row| AddressParticipation {
            address: row.get("address"),
            is_sender: row.get::<i64, _>("is_sender") != 0,
            is_recipient: row.get::<i64, _>("is_recipient") != 0,
            balance_change: row.get("balance_change"),
        })
        .collect())
}

/// Delete every participant row of `tx_hash` and insert `participants`.
pub async fn replace_participants(
    conn: &mut SqliteConnection,
    tx_hash: &str,
    participants: &[(String, ParticipantRole)],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM transaction_participants WHERE tx_hash = ?")
        .bind(tx_hash)
        .execute(&mut *conn)
        .await?;

    for (address, role) in participants {
        sqlx::query(
            "INSERT INTO transaction_participants (tx_hash, address, role) VALUES (?, ?, ?)
             ON CONFLICT(tx_hash, address, role) DO NOTHING",
        )
        .bind(tx_hash)
        .bind(address)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn list_participants(
    conn: &mut SqliteConnection,
    tx_hash: &str,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT address, role FROM transaction_participants WHERE tx_hash = ? ORDER BY role DESC, address",
    )
    .bind(tx_hash)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(|row| (row.get("address"), row.get("role"))).collect())
}
