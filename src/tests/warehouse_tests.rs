use rust_decimal::Decimal;
use sqlx::Row;

use crate::db::warehouse;
use crate::error::PipelineError;
use crate::etl::aggregate;
use crate::tests::helpers::{memory_pool, swap_row, tx_id, PAIR_A, USDC, WAVAX};

#[test]
fn id_bytes_decodes_prefixed_hex() {
    assert_eq!(warehouse::id_bytes("0x0a0b").unwrap(), vec![0x0a, 0x0b]);
    assert_eq!(warehouse::id_bytes("0a0b").unwrap(), vec![0x0a, 0x0b]);
    assert!(matches!(
        warehouse::id_bytes("0xzz"),
        Err(PipelineError::InvalidId(_))
    ));
}

#[tokio::test]
async fn empty_warehouse_has_cursor_zero() {
    let pool = memory_pool().await;
    assert_eq!(warehouse::max_fact_block(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn token_upsert_is_idempotent() {
    let pool = memory_pool().await;

    let first = warehouse::upsert_token(&pool, WAVAX, "WAVAX", "Wrapped AVAX")
        .await
        .unwrap();
    let second = warehouse::upsert_token(&pool, WAVAX, "WAVAX", "Wrapped AVAX")
        .await
        .unwrap();
    assert_eq!(first, second);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dim_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let map = warehouse::token_map(&pool).await.unwrap();
    assert_eq!(map.get(WAVAX), Some(&first));
}

#[tokio::test]
async fn pair_upsert_links_tokens() {
    let pool = memory_pool().await;
    let t0 = warehouse::upsert_token(&pool, WAVAX, "WAVAX", "Wrapped AVAX")
        .await
        .unwrap();
    let t1 = warehouse::upsert_token(&pool, USDC, "USDC", "USD Coin")
        .await
        .unwrap();

    let idx = warehouse::upsert_pair(&pool, PAIR_A, "WAVAX-USDC", t0, t1)
        .await
        .unwrap();
    let again = warehouse::upsert_pair(&pool, PAIR_A, "WAVAX-USDC", t0, t1)
        .await
        .unwrap();
    assert_eq!(idx, again);

    let map = warehouse::pair_map(&pool).await.unwrap();
    assert_eq!(map.get(PAIR_A), Some(&idx));
}

async fn seeded_pair(pool: &sqlx::SqlitePool) -> i64 {
    let t0 = warehouse::upsert_token(pool, WAVAX, "WAVAX", "Wrapped AVAX")
        .await
        .unwrap();
    let t1 = warehouse::upsert_token(pool, USDC, "USDC", "USD Coin")
        .await
        .unwrap();
    warehouse::upsert_pair(pool, PAIR_A, "WAVAX-USDC", t0, t1)
        .await
        .unwrap()
}

#[tokio::test]
async fn load_batch_advances_the_cursor() {
    let pool = memory_pool().await;
    let pair_idx = seeded_pair(&pool).await;

    let rows = vec![
        swap_row(100, 1, 0, PAIR_A, true, 5),
        swap_row(100, 2, 0, PAIR_A, true, 3),
        swap_row(101, 3, 0, PAIR_A, false, 7),
    ];
    let blocks = aggregate::block_rows(&rows);
    let transactions = aggregate::transaction_rows(&rows);
    let facts: Vec<_> = aggregate::aggregate_swaps(&rows)
        .into_iter()
        .map(|f| (pair_idx, f))
        .collect();

    warehouse::load_batch(&pool, &blocks, &transactions, &facts)
        .await
        .unwrap();

    assert_eq!(warehouse::max_fact_block(&pool).await.unwrap(), 101);

    let fact_rows = sqlx::query("SELECT block_number, is_sell, amount0_in FROM fact_swap ORDER BY block_number, is_sell")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(fact_rows.len(), 2);
    let sell = &fact_rows[0];
    assert_eq!(sell.get::<i64, _>("block_number"), 100);
    assert_eq!(sell.get::<i64, _>("is_sell"), 1);
    // Amounts are stored as decimal strings.
    let amount: String = sell.get("amount0_in");
    assert_eq!(amount.parse::<Decimal>().unwrap(), Decimal::from(8));
}

#[tokio::test]
async fn replaying_a_loaded_batch_adds_nothing() {
    let pool = memory_pool().await;
    let pair_idx = seeded_pair(&pool).await;

    let rows = vec![
        swap_row(100, 1, 0, PAIR_A, true, 5),
        swap_row(101, 2, 0, PAIR_A, true, 3),
    ];
    let blocks = aggregate::block_rows(&rows);
    let transactions = aggregate::transaction_rows(&rows);
    let facts: Vec<_> = aggregate::aggregate_swaps(&rows)
        .into_iter()
        .map(|f| (pair_idx, f))
        .collect();

    warehouse::load_batch(&pool, &blocks, &transactions, &facts)
        .await
        .unwrap();
    // A crash between insert and cursor advance replays the whole batch.
    warehouse::load_batch(&pool, &blocks, &transactions, &facts)
        .await
        .unwrap();

    let facts_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fact_swap")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(facts_count, 2);
    let blocks_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dim_blocks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(blocks_count, 2);
}

#[tokio::test]
async fn partially_overlapping_batch_loads_only_new_blocks() {
    let pool = memory_pool().await;
    let pair_idx = seeded_pair(&pool).await;

    let first = vec![swap_row(100, 1, 0, PAIR_A, true, 5)];
    let blocks = aggregate::block_rows(&first);
    let facts: Vec<_> = aggregate::aggregate_swaps(&first)
        .into_iter()
        .map(|f| (pair_idx, f))
        .collect();
    warehouse::load_batch(&pool, &blocks, &[], &facts).await.unwrap();

    // Boundary block 100 comes around again together with new block 101.
    let second = vec![
        swap_row(100, 1, 0, PAIR_A, true, 5),
        swap_row(101, 2, 0, PAIR_A, true, 3),
    ];
    let blocks = aggregate::block_rows(&second);
    let facts: Vec<_> = aggregate::aggregate_swaps(&second)
        .into_iter()
        .map(|f| (pair_idx, f))
        .collect();
    warehouse::load_batch(&pool, &blocks, &[], &facts).await.unwrap();

    assert_eq!(warehouse::max_fact_block(&pool).await.unwrap(), 101);
    let per_block: Vec<(i64, i64)> =
        sqlx::query_as("SELECT block_number, COUNT(*) FROM fact_swap GROUP BY block_number")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(per_block, vec![(100, 1), (101, 1)]);
}

#[tokio::test]
async fn transaction_rows_are_keyed_by_natural_id() {
    let pool = memory_pool().await;
    let pair_idx = seeded_pair(&pool).await;

    let rows = vec![swap_row(100, 7, 0, PAIR_A, true, 5)];
    let blocks = aggregate::block_rows(&rows);
    let transactions = aggregate::transaction_rows(&rows);
    let facts: Vec<_> = aggregate::aggregate_swaps(&rows)
        .into_iter()
        .map(|f| (pair_idx, f))
        .collect();
    warehouse::load_batch(&pool, &blocks, &transactions, &facts)
        .await
        .unwrap();

    let stored: Vec<u8> = sqlx::query_scalar("SELECT id FROM dim_transactions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(format!("0x{}", hex::encode(stored)), tx_id(7));
}
