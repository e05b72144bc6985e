use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::blob::BlobStore;
use crate::blockchain::models::FetchedTransaction;
use crate::error::{IndexerError, Result};
use crate::ledger::{ft, history, nft};
use crate::protocol::{classify, ScriptKind};

/// Where a transaction was seen: a block, or the mempool (`height` -1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: i64,
    pub timestamp: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub groups_indexed: usize,
    pub groups_skipped: usize,
    pub ft_spent: usize,
}

/// Apply one transaction to the ledger: index its token output groups left to
/// right, then spend the FT outputs its inputs consume, then record history.
///
/// A group that fails to decode is logged and skipped; database errors abort
/// the transaction and propagate to the cycle.
pub async fn process_transaction(
    conn: &mut SqliteConnection,
    blobs: &dyn BlobStore,
    fetched: &FetchedTransaction,
    ctx: &BlockContext,
    record_history: bool,
) -> Result<ProcessStats> {
    let tx = &fetched.tx;
    let mut stats = ProcessStats::default();
    let mut index = 0usize;

    while index < tx.vout.len() {
        let kind = classify(tx.vout[index].asm());
        let step = match kind {
            ScriptKind::Normal | ScriptKind::Multisig => {
                index += 1;
                continue;
            }
            ScriptKind::Ft => ft::index_output(conn, tx, index, ctx.timestamp).await,
            ScriptKind::NftCollection => nft::index_collection(conn, blobs, tx, index, ctx.timestamp).await,
            ScriptKind::Nft(variant) => nft::index_nft(conn, blobs, tx, index, variant, ctx.timestamp).await,
        };

        let width = match step {
            Ok(width) => {
                stats.groups_indexed += 1;
                width
            }
            Err(IndexerError::Protocol(e)) => {
                warn!("Skipping {:?} output {} of {}: {}", kind, index, tx.txid, e);
                stats.groups_skipped += 1;
                kind.group_width()
            }
            Err(e) => return Err(e),
        };
        index = index.saturating_add(width.max(1));
    }

    stats.ft_spent = ft::apply_spends(conn, tx).await?;

    if record_history {
        history::record_transaction(conn, fetched, ctx.height, ctx.timestamp).await?;
    }

    debug!(
        "Processed {}: {} groups indexed, {} skipped, {} FT outputs spent",
        tx.txid, stats.groups_indexed, stats.groups_skipped, stats.ft_spent
    );
    Ok(stats)
}
