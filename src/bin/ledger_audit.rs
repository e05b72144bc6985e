use tbc_token_indexer::config::Config;
use tbc_token_indexer::db::{checkpoint, connection, ft};

/// Checks every FT contract for conservation: balances never exceed supply and
/// the holder count matches the positive balance rows. Exits non-zero on a violation.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    println!("Opening {}...", config.database_url);
    let pool = connection::establish_connection(&config.database_url).await?;
    let mut conn = pool.acquire().await?;

    let progress = checkpoint::load(&mut conn, config.genesis_height).await?;
    println!(
        "Indexed up to height {} ({} mempool, {} last mempool)",
        progress.height,
        progress.mempool.len(),
        progress.last_mempool.len()
    );

    let totals = ft::contract_totals(&mut conn).await?;
    let mut violations = 0;
    for contract in &totals {
        if !contract.is_conserved() {
            violations += 1;
            println!(
                "FAIL {}: supply {}, balances {}, holders {} (rows {})",
                contract.contract_id,
                contract.supply,
                contract.balance_sum,
                contract.holders_count,
                contract.balance_rows
            );
        }
    }

    println!("Checked {} contracts, {} violations", totals.len(), violations);
    drop(conn);
    pool.close().await;

    if violations > 0 {
        std::process::exit(1);
    }
    println!("Ledger is consistent");
    Ok(())
}
