use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::models::{FtBalance, FtToken, FtTxo};

/// Per-contract totals used by the conservation audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTotals {
    pub contract_id: String,
    pub supply: i64,
    pub holders_count: i64,
    pub balance_sum: i64,
    pub balance_rows: i64,
}

impl ContractTotals {
    pub fn is_conserved(&self) -> bool {
        self.balance_sum <= self.supply && self.holders_count == self.balance_rows
    }
}

pub async fn find_contract_by_origin(
    conn: &mut SqliteConnection,
    origin: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT ft_contract_id FROM ft_tokens WHERE ft_origin_utxo = ? LIMIT 1")
        .bind(origin)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.get("ft_contract_id")))
}

/// Returns false when the token already exists.
pub async fn insert_token(conn: &mut SqliteConnection, token: &FtToken) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO ft_tokens
        (ft_contract_id, ft_code_script, ft_tape_script, ft_supply, ft_decimal, ft_name, ft_symbol,
         ft_description, ft_origin_utxo, ft_creator_combine_script, ft_holders_count, ft_icon_url,
         ft_create_timestamp, ft_token_price)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(ft_contract_id) DO NOTHING
        "#,
    )
    .bind(&token.contract_id)
    .bind(&token.code_script)
    .bind(&token.tape_script)
    .bind(token.supply)
    .bind(token.decimals)
    .bind(&token.name)
    .bind(&token.symbol)
    .bind(&token.description)
    .bind(&token.origin_utxo)
    .bind(&token.creator_script)
    .bind(token.holders_count)
    .bind(&token.icon_url)
    .bind(token.create_timestamp)
    .bind(token.price)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_token(conn: &mut SqliteConnection, contract_id: &str) -> Result<Option<FtToken>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM ft_tokens WHERE ft_contract_id = ?")
        .bind(contract_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|row| FtToken {
        contract_id: row.get("ft_contract_id"),
        code_script: row.get("ft_code_script"),
        tape_script: row.get("ft_tape_script"),
        supply: row.get("ft_supply"),
        decimals: row.get("ft_decimal"),
        name: row.get("ft_name"),
        symbol: row.get("ft_symbol"),
        description: row.get("ft_description"),
        origin_utxo: row.get("ft_origin_utxo"),
        creator_script: row.get("ft_creator_combine_script"),
        holders_count: row.get("ft_holders_count"),
        icon_url: row.get("ft_icon_url"),
        create_timestamp: row.get("ft_create_timestamp"),
        price: row.get("ft_token_price"),
    }))
}

pub async fn adjust_holders(conn: &mut SqliteConnection, contract_id: &str, delta: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ft_tokens SET ft_holders_count = ft_holders_count + ? WHERE ft_contract_id = ?")
        .bind(delta)
        .bind(contract_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns false when the output was already recorded.
pub async fn insert_txo(conn: &mut SqliteConnection, txo: &FtTxo) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO ft_txo_set
        (utxo_txid, utxo_vout, ft_holder_combine_script, ft_contract_id, utxo_balance, ft_balance, if_spend)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(utxo_txid, utxo_vout) DO NOTHING
        "#,
    )
    .bind(&txo.utxo_txid)
    .bind(txo.utxo_vout)
    .bind(&txo.holder_script)
    .bind(&txo.contract_id)
    .bind(txo.utxo_balance)
    .bind(txo.ft_balance)
    .bind(txo.spent)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_txo(conn: &mut SqliteConnection, txid: &str, vout: i64) -> Result<Option<FtTxo>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM ft_txo_set WHERE utxo_txid = ? AND utxo_vout = ?")
        .bind(txid)
        .bind(vout)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(txo_from_row))
}

pub async fn list_txos(conn: &mut SqliteConnection, contract_id: &str) -> Result<Vec<FtTxo>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM ft_txo_set WHERE ft_contract_id = ? ORDER BY utxo_txid, utxo_vout")
        .bind(contract_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(txo_from_row).collect())
}

/// Flag an output as spent. Returns false when it was already spent.
pub async fn mark_spent(conn: &mut SqliteConnection, txid: &str, vout: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE ft_txo_set SET if_spend = 1 WHERE utxo_txid = ? AND utxo_vout = ? AND if_spend = 0")
        .bind(txid)
        .bind(vout)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn get_balance(
    conn: &mut SqliteConnection,
    contract_id: &str,
    holder_script: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT ft_balance FROM ft_balance WHERE ft_contract_id = ? AND ft_holder_combine_script = ?",
    )
    .bind(contract_id)
    .bind(holder_script)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|r| r.get("ft_balance")))
}

pub async fn list_balances(conn: &mut SqliteConnection, contract_id: &str) -> Result<Vec<FtBalance>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM ft_balance WHERE ft_contract_id = ? ORDER BY ft_holder_combine_script",
    )
    .bind(contract_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| FtBalance {
            contract_id: row.get("ft_contract_id"),
            holder_script: row.get("ft_holder_combine_script"),
            balance: row.get("ft_balance"),
        })
        .collect())
}

pub async fn insert_balance(
    conn: &mut SqliteConnection,
    contract_id: &str,
    holder_script: &str,
    balance: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO ft_balance (ft_contract_id, ft_holder_combine_script, ft_balance) VALUES (?, ?, ?)")
        .bind(contract_id)
        .bind(holder_script)
        .bind(balance)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn add_balance(
    conn: &mut SqliteConnection,
    contract_id: &str,
    holder_script: &str,
    delta: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE ft_balance SET ft_balance = ft_balance + ? WHERE ft_contract_id = ? AND ft_holder_combine_script = ?",
    )
    .bind(delta)
    .bind(contract_id)
    .bind(holder_script)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_balance(
    conn: &mut SqliteConnection,
    contract_id: &str,
    holder_script: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM ft_balance WHERE ft_contract_id = ? AND ft_holder_combine_script = ?")
        .bind(contract_id)
        .bind(holder_script)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Supply, holder count and balance totals for every contract.
pub async fn contract_totals(conn: &mut SqliteConnection) -> Result<Vec<ContractTotals>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT t.ft_contract_id AS contract_id,
               t.ft_supply AS supply,
               t.ft_holders_count AS holders_count,
               COALESCE(SUM(b.ft_balance), 0) AS balance_sum,
               COUNT(b.ft_balance) AS balance_rows
        FROM ft_tokens t
        LEFT JOIN ft_balance b ON b.ft_contract_id = t.ft_contract_id AND b.ft_balance > 0
        GROUP BY t.ft_contract_id, t.ft_supply, t.ft_holders_count
        ORDER BY t.ft_contract_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ContractTotals {
            contract_id: row.get("contract_id"),
            supply: row.get("supply"),
            holders_count: row.get("holders_count"),
            balance_sum: row.get("balance_sum"),
            balance_rows: row.get("balance_rows"),
        })
        .collect())
}

fn txo_from_row(row: &SqliteRow) -> FtTxo {
    FtTxo {
        utxo_txid: row.get("utxo_txid"),
        utxo_vout: row.get("utxo_vout"),
        holder_script: row.get("ft_holder_combine_script"),
        contract_id: row.get("ft_contract_id"),
        utxo_balance: row.get("utxo_balance"),
        ft_balance: row.get("ft_balance"),
        spent: row.get::<i64, _>("if_spend") != 0,
    }
}
