//! Warehouse reads and writes. Dimension writes are upsert-by-identity
//! (insert-if-absent, then read back the surrogate key); block and fact
//! writes are bulk appends guarded by the boundary-block integrity retry.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::{BlockRow, FactRow, TransactionRow};

/// Decode a `0x`-prefixed hex identifier into raw bytes.
pub fn id_bytes(id: &str) -> Result<Vec<u8>, PipelineError> {
    let stripped = id.strip_prefix("0x").unwrap_or(id);
    hex::decode(stripped).map_err(|_| PipelineError::InvalidId(id.to_string()))
}

fn id_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Highest block number durably present in the fact table; 0 when empty.
/// This is the derived cursor: it can only name fully loaded blocks.
pub async fn max_fact_block(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(block_number) FROM fact_swap")
        .fetch_one(pool)
        .await?;
    Ok(max.unwrap_or(0))
}

pub async fn token_map(pool: &SqlitePool) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, token_idx FROM dim_tokens")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (id_hex(&row.get::<Vec<u8>, _>("id")), row.get("token_idx")))
        .collect())
}

pub async fn pair_map(pool: &SqlitePool) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, pair_idx FROM dim_pairs")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (id_hex(&row.get::<Vec<u8>, _>("id")), row.get("pair_idx")))
        .collect())
}

/// Insert-if-absent, then read back the key. A concurrent duplicate insert
/// is a no-op and the read-back still returns the existing key.
pub async fn upsert_token(
    pool: &SqlitePool,
    id: &str,
    symbol: &str,
    name: &str,
) -> Result<i64, PipelineError> {
    let bytes = id_bytes(id)?;
    sqlx::query("INSERT OR IGNORE INTO dim_tokens (id, symbol, name) VALUES (?, ?, ?)")
        .bind(&bytes)
        .bind(symbol)
        .bind(name)
        .execute(pool)
        .await?;
    let idx: i64 = sqlx::query_scalar("SELECT token_idx FROM dim_tokens WHERE id = ?")
        .bind(&bytes)
        .fetch_one(pool)
        .await?;
    Ok(idx)
}

pub async fn upsert_pair(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    token0_idx: i64,
    token1_idx: i64,
) -> Result<i64, PipelineError> {
    let bytes = id_bytes(id)?;
    sqlx::query(
        "INSERT OR IGNORE INTO dim_pairs (id, name, token0_idx, token1_idx) VALUES (?, ?, ?, ?)",
    )
    .bind(&bytes)
    .bind(name)
    .bind(token0_idx)
    .bind(token1_idx)
    .execute(pool)
    .await?;
    let idx: i64 = sqlx::query_scalar("SELECT pair_idx FROM dim_pairs WHERE id = ?")
        .bind(&bytes)
        .fetch_one(pool)
        .await?;
    Ok(idx)
}

async fn insert_blocks(pool: &SqlitePool, blocks: &[BlockRow]) -> Result<(), sqlx::Error> {
    if blocks.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for block in blocks {
        let timestamp = DateTime::<Utc>::from_timestamp(block.timestamp_unix, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        sqlx::query("INSERT INTO dim_blocks (block_number, timestamp_unix, timestamp) VALUES (?, ?, ?)")
            .bind(block.block_number)
            .bind(block.timestamp_unix)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

async fn insert_transactions(
    pool: &SqlitePool,
    transactions: &[TransactionRow],
) -> Result<(), PipelineError> {
    if transactions.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for transaction in transactions {
        let bytes = id_bytes(&transaction.id)?;
        // Keyed by the natural transaction id, so the boundary block can be
        // replayed without raising.
        sqlx::query("INSERT OR IGNORE INTO dim_transactions (id, block_number) VALUES (?, ?)")
            .bind(&bytes)
            .bind(transaction.block_number)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn insert_facts(pool: &SqlitePool, facts: &[(i64, FactRow)]) -> Result<(), sqlx::Error> {
    if facts.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for (pair_idx, fact) in facts {
        sqlx::query(
            "INSERT INTO fact_swap
             (block_number, pair_idx, is_sell, amount0_in, amount0_out, amount1_in, amount1_out, amount_usd)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(fact.block_number)
        .bind(pair_idx)
        .bind(fact.is_sell as i64)
        .bind(fact.amount0_in.to_string())
        .bind(fact.amount0_out.to_string())
        .bind(fact.amount1_in.to_string())
        .bind(fact.amount1_out.to_string())
        .bind(fact.amount_usd.to_string())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

async fn existing_block_numbers(
    pool: &SqlitePool,
    table: &str,
    min: i64,
    max: i64,
) -> Result<HashSet<i64>, sqlx::Error> {
    let query = format!(
        "SELECT DISTINCT block_number FROM {table} WHERE block_number >= ? AND block_number <= ?"
    );
    let rows = sqlx::query_scalar::<_, i64>(&query)
        .bind(min)
        .bind(max)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn block_span<'a, I: Iterator<Item = &'a i64>>(numbers: I) -> Option<(i64, i64)> {
    let mut span: Option<(i64, i64)> = None;
    for &n in numbers {
        span = Some(match span {
            None => (n, n),
            Some((min, max)) => (min.min(n), max.max(n)),
        });
    }
    span
}

async fn try_load(
    pool: &SqlitePool,
    blocks: &[BlockRow],
    transactions: &[TransactionRow],
    facts: &[(i64, FactRow)],
) -> Result<(), PipelineError> {
    insert_blocks(pool, blocks).await?;
    insert_transactions(pool, transactions).await?;
    insert_facts(pool, facts).await?;
    Ok(())
}

/// Load one closed batch: blocks, then transactions, then facts.
///
/// A uniqueness violation means a previous partial run already wrote part of
/// this range. The batch is retried exactly once with the already-present
/// block numbers excluded; a second violation is fatal.
pub async fn load_batch(
    pool: &SqlitePool,
    blocks: &[BlockRow],
    transactions: &[TransactionRow],
    facts: &[(i64, FactRow)],
) -> Result<(), PipelineError> {
    match try_load(pool, blocks, transactions, facts).await {
        Ok(()) => Ok(()),
        Err(PipelineError::Db(e)) if is_unique_violation(&e) => {
            warn!("uniqueness violation on insert, re-checking boundary blocks");

            let mut retained_blocks = blocks.to_vec();
            if let Some((min, max)) = block_span(blocks.iter().map(|b| &b.block_number)) {
                let present = existing_block_numbers(pool, "dim_blocks", min, max).await?;
                retained_blocks.retain(|b| !present.contains(&b.block_number));
            }

            let mut retained_facts = facts.to_vec();
            if let Some((min, max)) = block_span(facts.iter().map(|(_, f)| &f.block_number)) {
                let present = existing_block_numbers(pool, "fact_swap", min, max).await?;
                retained_facts.retain(|(_, f)| !present.contains(&f.block_number));
            }

            info!(
                blocks = retained_blocks.len(),
                facts = retained_facts.len(),
                "re-attempting insert without already-present blocks"
            );
            try_load(pool, &retained_blocks, transactions, &retained_facts)
                .await
                .map_err(|retry_err| match retry_err {
                    PipelineError::Db(e) if is_unique_violation(&e) => {
                        let (first, last) = block_span(blocks.iter().map(|b| &b.block_number))
                            .unwrap_or((0, 0));
                        PipelineError::IntegrityRetryExhausted { first, last }
                    }
                    other => other,
                })
        }
        Err(e) => Err(e),
    }
}
