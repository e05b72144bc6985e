use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};
use tracing::info;

use crate::error::{IndexerError, Result};

const INDEX_HEIGHT: &str = "index_height";
const MEMPOOL: &str = "mempool";
const LAST_MEMPOOL: &str = "last_mempool";

/// Persisted scan progress: the next height to index and the two mempool snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub height: i64,
    pub mempool: Vec<String>,
    pub last_mempool: Vec<String>,
}

impl Checkpoint {
    pub fn genesis(height: i64) -> Self {
        Self {
            height,
            mempool: Vec::new(),
            last_mempool: Vec::new(),
        }
    }
}

/// Load the checkpoint, creating it at `genesis_height` on first run.
///
/// Fails when the stored height is below genesis or a value does not parse.
pub async fn load(conn: &mut SqliteConnection, genesis_height: i64) -> Result<Checkpoint> {
    for (name, value) in [
        (INDEX_HEIGHT, genesis_height.to_string()),
        (MEMPOOL, "[]".to_string()),
        (LAST_MEMPOOL, "[]".to_string()),
    ] {
        sqlx::query("INSERT INTO index_build_status (name, value) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(value)
            .execute(&mut *conn)
            .await?;
    }

    let raw_height = read_value(conn, INDEX_HEIGHT).await?;
    let height: i64 = raw_height
        .trim()
        .parse()
        .map_err(|_| IndexerError::Checkpoint(format!("index height {:?} is not an integer", raw_height)))?;
    if height < genesis_height {
        return Err(IndexerError::Checkpoint(format!(
            "stored index height {} is below genesis height {}",
            height, genesis_height
        )));
    }

    let mempool = read_txids(conn, MEMPOOL).await?;
    let last_mempool = read_txids(conn, LAST_MEMPOOL).await?;

    Ok(Checkpoint {
        height,
        mempool,
        last_mempool,
    })
}

pub async fn save(conn: &mut SqliteConnection, checkpoint: &Checkpoint) -> Result<()> {
    let mempool = serde_json::to_string(&checkpoint.mempool)
        .map_err(|e| IndexerError::Checkpoint(e.to_string()))?;
    let last_mempool = serde_json::to_string(&checkpoint.last_mempool)
        .map_err(|e| IndexerError::Checkpoint(e.to_string()))?;

    for (name, value) in [
        (INDEX_HEIGHT, checkpoint.height.to_string()),
        (MEMPOOL, mempool),
        (LAST_MEMPOOL, last_mempool),
    ] {
        sqlx::query(
            "INSERT INTO index_build_status (name, value) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )
        .bind(name)
        .bind(value)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn reset(conn: &mut SqliteConnection, genesis_height: i64) -> Result<()> {
    info!("Resetting checkpoint to genesis height {}", genesis_height);
    save(conn, &Checkpoint::genesis(genesis_height)).await
}

async fn read_value(conn: &mut SqliteConnection, name: &str) -> Result<String> {
    let row = sqlx::query("SELECT value FROM index_build_status WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| IndexerError::Checkpoint(format!("missing {}", name)))?;
    Ok(row.get("value"))
}

async fn read_txids(conn: &mut SqliteConnection, name: &str) -> Result<Vec<String>> {
    let raw = read_value(conn, name).await?;
    serde_json::from_str(&raw).map_err(|e| IndexerError::Checkpoint(format!("{} is not a txid list: {}", name, e)))
}
