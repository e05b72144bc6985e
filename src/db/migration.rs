use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::db::{LEDGER_TABLES, SCHEMA};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database migrations completed successfully");
    Ok(())
}

/// Delete every ledger and history row. The checkpoint is reset separately.
pub async fn reset_ledger(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    warn!("Clearing all ledger tables");

    for table in LEDGER_TABLES {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
