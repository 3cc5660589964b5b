use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dim_blocks (
            block_number INTEGER PRIMARY KEY,
            timestamp_unix INTEGER NOT NULL,
            timestamp TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dim_transactions (
            transact_idx INTEGER PRIMARY KEY AUTOINCREMENT,
            id BLOB NOT NULL UNIQUE,
            block_number INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dim_tokens (
            token_idx INTEGER PRIMARY KEY AUTOINCREMENT,
            id BLOB NOT NULL UNIQUE,
            symbol TEXT NOT NULL,
            name TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dim_pairs (
            pair_idx INTEGER PRIMARY KEY AUTOINCREMENT,
            id BLOB NOT NULL UNIQUE,
            name TEXT NOT NULL,
            token0_idx INTEGER NOT NULL REFERENCES dim_tokens(token_idx),
            token1_idx INTEGER NOT NULL REFERENCES dim_tokens(token_idx)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS fact_swap (
            swap_idx INTEGER PRIMARY KEY AUTOINCREMENT,
            block_number INTEGER NOT NULL,
            pair_idx INTEGER NOT NULL REFERENCES dim_pairs(pair_idx),
            is_sell INTEGER NOT NULL,
            amount0_in TEXT NOT NULL,
            amount0_out TEXT NOT NULL,
            amount1_in TEXT NOT NULL,
            amount1_out TEXT NOT NULL,
            amount_usd TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fact_swap_block_number
         ON fact_swap(block_number)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dim_transactions_block_number
         ON dim_transactions(block_number)",
    )
    .execute(pool)
    .await?;

    info!("Database migrations completed successfully");
    Ok(())
}
