// Per-transaction history: fee, participants and per-address balance changes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::blockchain::models::{FetchedTransaction, Prevout, TxOutput, SCALING_FACTOR};
use crate::db;
use crate::error::Result;
use crate::models::{AddressParticipation, ParticipantRole, TransactionRecord, TxType};
use crate::protocol::classifier::pool_participant;
use crate::protocol::script::multisig_address;
use crate::protocol::{classify, ScriptKind};

pub const COINBASE_PARTICIPANT: &str = "coinbase";

/// Synthetic spend charged for a coinbase input, in minor units.
pub const COINBASE_SPEND: i64 = 325;

pub const UNCONFIRMED_UTC: &str = "unconfirmed";

/// Everything the history tables need from one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    pub tx_type: TxType,
    pub total_receive: i64,
    pub total_spend: i64,
    pub senders: BTreeSet<String>,
    pub receivers: BTreeSet<String>,
    /// Net change per address, in first-seen order.
    pub balance_changes: Vec<(String, i64)>,
}

impl HistorySummary {
    fn new() -> Self {
        Self {
            tx_type: TxType::P2pkh,
            total_receive: 0,
            total_spend: 0,
            senders: BTreeSet::new(),
            receivers: BTreeSet::new(),
            balance_changes: Vec::new(),
        }
    }

    fn change(&mut self, address: &str, delta: i64) {
        match self.balance_changes.iter_mut().find(|(a, _)| a == address) {
            Some((_, total)) => *total += delta,
            None => self.balance_changes.push((address.to_string(), delta)),
        }
    }

    fn has_change(&self, address: &str) -> bool {
        self.balance_changes.iter().any(|(a, _)| a == address)
    }

    pub fn fee(&self) -> String {
        format_minor_units(self.total_spend - self.total_receive)
    }
}

/// Aggregate outputs and resolved inputs of a fetched transaction.
pub fn summarize(fetched: &FetchedTransaction) -> HistorySummary {
    let tx = &fetched.tx;
    let mut summary = HistorySummary::new();
    let mut type_detected = false;
    let mut detect = |summary: &mut HistorySummary, tx_type: TxType| {
        if !type_detected {
            type_detected = true;
            summary.tx_type = tx_type;
        }
    };

    for output in &tx.vout {
        let value = output.minor_value();
        summary.total_receive += value;

        if output.is_pay_to_address() && !output.script_pub_key.addresses.is_empty() {
            for address in &output.script_pub_key.addresses {
                summary.receivers.insert(address.clone());
                summary.change(address, value);
            }
            continue;
        }

        match classify(output.asm()) {
            ScriptKind::Ft => {
                detect(&mut summary, TxType::Tbc20);
                // Pool contracts participate but never carry a balance change.
                if let Some(pool) = pool_participant(output.asm()) {
                    summary.receivers.insert(pool);
                }
            }
            ScriptKind::Nft(_) | ScriptKind::NftCollection => detect(&mut summary, TxType::Tbc721),
            ScriptKind::Multisig => {
                detect(&mut summary, TxType::P2ms);
                if let Some(address) = multisig_identity(output) {
                    summary.receivers.insert(address.clone());
                    summary.change(&address, value);
                }
            }
            ScriptKind::Normal => {}
        }
    }

    for (input, prevout) in tx.vin.iter().zip(&fetched.prevouts) {
        let spent = match prevout {
            Prevout::Coinbase => {
                summary.senders.insert(COINBASE_PARTICIPANT.to_string());
                summary.total_spend += COINBASE_SPEND;
                continue;
            }
            Prevout::Missing => {
                warn!(
                    "Skipping unresolved input {:?} of {} in history",
                    input.outpoint(),
                    tx.txid
                );
                continue;
            }
            Prevout::Resolved(output) => output,
        };

        let value = spent.minor_value();
        summary.total_spend += value;

        if spent.is_pay_to_address() && !spent.script_pub_key.addresses.is_empty() {
            for address in &spent.script_pub_key.addresses {
                summary.senders.insert(address.clone());
                summary.change(address, -value);
            }
            continue;
        }

        match classify(spent.asm()) {
            ScriptKind::Multisig => {
                if let Some(address) = multisig_identity(spent) {
                    summary.senders.insert(address.clone());
                    summary.change(&address, -value);
                }
            }
            ScriptKind::Ft => {
                if let Some(pool) = pool_participant(spent.asm()) {
                    summary.senders.insert(pool);
                }
            }
            _ => {}
        }
    }

    summary
}

fn multisig_identity(output: &TxOutput) -> Option<String> {
    match multisig_address(output.asm(), output.hex()) {
        Ok(address) => Some(address),
        Err(e) => {
            debug!("Unrecognised multisig output: {}", e);
            None
        }
    }
}

/// Per-address rows and the sender/recipient participant list.
///
/// A negative change makes an address a sender and every other receiver a
/// recipient; otherwise it is a recipient and every other sender a sender.
/// Participants without a change are recorded with "0". When no sender or no
/// recipient emerges, the first address with a change fills the role.
pub fn assign_roles(summary: &HistorySummary) -> (Vec<AddressParticipation>, Vec<(String, ParticipantRole)>) {
    let mut rows: Vec<AddressParticipation> = Vec::new();
    let mut final_senders = BTreeSet::new();
    let mut final_receivers = BTreeSet::new();

    for (address, change) in &summary.balance_changes {
        let is_sender = *change < 0;
        if is_sender {
            final_senders.insert(address.clone());
            final_receivers.extend(summary.receivers.iter().filter(|r| *r != address).cloned());
        } else {
            final_receivers.insert(address.clone());
            final_senders.extend(summary.senders.iter().filter(|s| *s != address).cloned());
        }

        upsert(
            &mut rows,
            AddressParticipation {
                address: address.clone(),
                is_sender,
                is_recipient: !is_sender,
                balance_change: format_minor_units(*change),
            },
        );
    }

    for sender in summary.senders.iter().filter(|s| !summary.has_change(s)) {
        final_senders.insert(sender.clone());
        upsert(
            &mut rows,
            AddressParticipation {
                address: sender.clone(),
                is_sender: true,
                is_recipient: false,
                balance_change: "0".to_string(),
            },
        );
    }

    for receiver in summary.receivers.iter().filter(|r| !summary.has_change(r)) {
        final_receivers.insert(receiver.clone());
        upsert(
            &mut rows,
            AddressParticipation {
                address: receiver.clone(),
                is_sender: false,
                is_recipient: true,
                balance_change: "0".to_string(),
            },
        );
    }

    if let Some((first, _)) = summary.balance_changes.first() {
        if final_senders.is_empty() {
            final_senders.insert(first.clone());
        }
        if final_receivers.is_empty() {
            final_receivers.insert(first.clone());
        }
    }

    let participants = final_senders
        .into_iter()
        .map(|a| (a, ParticipantRole::Sender))
        .chain(final_receivers.into_iter().map(|a| (a, ParticipantRole::Recipient)))
        .collect();

    (rows, participants)
}

// A later row for the same address replaces the earlier one.
fn upsert(rows: &mut Vec<AddressParticipation>, row: AddressParticipation) {
    match rows.iter_mut().find(|existing| existing.address == row.address) {
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

/// Render minor units as a decimal coin amount without trailing zeros.
pub fn format_minor_units(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let scale = SCALING_FACTOR as u64;
    let whole = abs / scale;
    let fraction = abs % scale;

    if fraction == 0 {
        return format!("{}{}", sign, whole);
    }
    let fraction = format!("{:06}", fraction);
    format!("{}{}.{}", sign, whole, fraction.trim_end_matches('0'))
}

pub fn format_utc_time(block_height: i64, timestamp: i64) -> String {
    if block_height < 1 {
        return UNCONFIRMED_UTC.to_string();
    }
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| UNCONFIRMED_UTC.to_string())
}

/// Write the transaction row, its address rows, and replace its participants.
pub async fn record_transaction(
    conn: &mut SqliteConnection,
    fetched: &FetchedTransaction,
    block_height: i64,
    timestamp: i64,
) -> Result<()> {
    let summary = summarize(fetched);
    let record = TransactionRecord {
        tx_hash: fetched.tx.txid.clone(),
        fee: summary.fee(),
        timestamp,
        utc_time: format_utc_time(block_height, timestamp),
        tx_type: summary.tx_type,
        block_height,
    };
    db::transaction::upsert_transaction(conn, &record).await?;

    let (rows, participants) = assign_roles(&summary);
    for row in &rows {
        db::transaction::upsert_participation(conn, &record.tx_hash, row).await?;
    }
    db::transaction::replace_participants(conn, &record.tx_hash, &participants).await?;

    debug!(
        "Recorded history for {}: {} fee {}, {} addresses",
        record.tx_hash,
        record.tx_type.as_str(),
        record.fee,
        rows.len()
    );
    Ok(())
}

/// Stamp a transaction recorded from the mempool with the block that confirmed it.
pub async fn confirm_transaction(
    conn: &mut SqliteConnection,
    tx_hash: &str,
    block_height: i64,
    timestamp: i64,
) -> Result<bool> {
    let utc_time = format_utc_time(block_height, timestamp);
    let updated = db::transaction::confirm_transaction(conn, tx_hash, block_height, timestamp, &utc_time).await?;
    Ok(updated)
}
