// Fungible-token ledger: token metadata, holder balances and the FT output set.
// Outputs are credited first (`index_output`), then inputs are debited
// (`apply_spends`): an input only identifies its holder and contract through
// the output it spends.

use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::blockchain::models::RawTransaction;
use crate::db;
use crate::error::Result;
use crate::models::FtToken;
use crate::models::FtTxo;
use crate::protocol::classifier::FT_SPEND_MARKER;
use crate::protocol::decoder::{decode_ft_metadata, decode_ft_output};
use crate::protocol::{DecodeError, ScriptKind};

/// Index the FT group starting at `index`. Returns the number of outputs consumed.
pub async fn index_output(
    conn: &mut SqliteConnection,
    tx: &RawTransaction,
    index: usize,
    timestamp: i64,
) -> Result<usize> {
    let output = decode_ft_output(tx, index)?;
    let amount = i64::try_from(output.amount).map_err(|_| DecodeError::AmountOverflow)?;

    let contract_id = match db::ft::find_contract_by_origin(conn, &output.origin).await? {
        Some(contract_id) => {
            info!("FT transfer: {} (contract {})", tx.txid, contract_id);
            contract_id
        }
        None => {
            let tape = tx.vout.get(index + 1).ok_or(DecodeError::MissingCompanion {
                index,
                companion: index + 1,
            })?;
            let metadata = decode_ft_metadata(tape)?;

            let token = FtToken {
                contract_id: tx.txid.clone(),
                code_script: tx.vout[index].hex().to_string(),
                tape_script: tape.hex().to_string(),
                supply: amount,
                decimals: metadata.decimals,
                name: metadata.name,
                symbol: metadata.symbol,
                description: String::new(),
                origin_utxo: output.origin.clone(),
                creator_script: output.holder_script.clone(),
                holders_count: 0,
                icon_url: String::new(),
                create_timestamp: timestamp,
                price: 0.0,
            };
            if db::ft::insert_token(conn, &token).await? {
                info!("FT mint: {} {} supply {}", tx.txid, token.symbol, token.supply);
            }
            token.contract_id
        }
    };

    let txo = FtTxo {
        utxo_txid: tx.txid.clone(),
        utxo_vout: index as i64,
        holder_script: output.holder_script,
        contract_id,
        utxo_balance: output.utxo_balance,
        ft_balance: amount,
        spent: false,
    };

    if db::ft::insert_txo(conn, &txo).await? {
        credit(conn, &txo.contract_id, &txo.holder_script, amount).await?;
    } else {
        debug!("FT output {}:{} already indexed", tx.txid, index);
    }

    Ok(ScriptKind::Ft.group_width())
}

/// Mark every FT output spent by `tx` and debit its holder. Returns how many were spent.
pub async fn apply_spends(conn: &mut SqliteConnection, tx: &RawTransaction) -> Result<usize> {
    let mut spent = 0;

    for input in &tx.vin {
        if !input.unlock_asm().starts_with(FT_SPEND_MARKER) {
            continue;
        }
        let Some((prev_txid, prev_vout)) = input.outpoint() else {
            continue;
        };
        let vout = i64::from(prev_vout);

        let Some(txo) = db::ft::get_txo(conn, prev_txid, vout).await? else {
            continue;
        };
        if !db::ft::mark_spent(conn, prev_txid, vout).await? {
            debug!("FT output {}:{} already spent", prev_txid, prev_vout);
            continue;
        }

        debit(conn, &txo.contract_id, &txo.holder_script, txo.ft_balance).await?;
        spent += 1;
    }

    Ok(spent)
}

/// Add `amount` to a holder; a new holder row bumps the token's holder count.
pub async fn credit(conn: &mut SqliteConnection, contract_id: &str, holder: &str, amount: i64) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    match db::ft::get_balance(conn, contract_id, holder).await? {
        None => {
            db::ft::insert_balance(conn, contract_id, holder, amount).await?;
            db::ft::adjust_holders(conn, contract_id, 1).await?;
        }
        Some(_) => db::ft::add_balance(conn, contract_id, holder, amount).await?,
    }
    Ok(())
}

/// Remove `amount` from a holder. Never takes a balance below zero.
pub async fn debit(conn: &mut SqliteConnection, contract_id: &str, holder: &str, amount: i64) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    match db::ft::get_balance(conn, contract_id, holder).await? {
        Some(balance) if balance == amount => {
            db::ft::delete_balance(conn, contract_id, holder).await?;
            db::ft::adjust_holders(conn, contract_id, -1).await?;
        }
        Some(balance) if balance > amount => {
            db::ft::add_balance(conn, contract_id, holder, -amount).await?;
        }
        Some(balance) => warn!(
            "FT debit of {} exceeds balance {} for holder {} of {}; skipped",
            amount, balance, holder, contract_id
        ),
        None => warn!(
            "FT debit of {} for holder {} of {} has no balance row; skipped",
            amount, holder, contract_id
        ),
    }
    Ok(())
}
