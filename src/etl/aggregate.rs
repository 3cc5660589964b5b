//! Batch aggregation: swaps are summed per `(block, pair, direction)`
//! before load, trading per-swap granularity for throughput.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{BlockRow, FactRow, SwapRow, TransactionRow};

/// Sum validated swaps into one fact row per `(block, pair, direction)`.
/// Rows violating the sign invariant are skipped.
pub fn aggregate_swaps(rows: &[SwapRow]) -> Vec<FactRow> {
    let mut grouped: BTreeMap<(i64, String, bool), FactRow> = BTreeMap::new();
    for row in rows {
        if !row.has_valid_signs() {
            continue;
        }
        let key = (row.block_number, row.pair_id.clone(), row.is_sell());
        let fact = grouped.entry(key).or_insert_with(|| FactRow {
            block_number: row.block_number,
            pair_id: row.pair_id.clone(),
            is_sell: row.is_sell(),
            amount0_in: Default::default(),
            amount0_out: Default::default(),
            amount1_in: Default::default(),
            amount1_out: Default::default(),
            amount_usd: Default::default(),
        });
        fact.amount0_in += row.amount0_in;
        fact.amount0_out += row.amount0_out;
        fact.amount1_in += row.amount1_in;
        fact.amount1_out += row.amount1_out;
        fact.amount_usd += row.amount_usd;
    }
    grouped.into_values().collect()
}

/// One row per distinct block, first timestamp wins (all rows of a block
/// share it anyway).
pub fn block_rows(rows: &[SwapRow]) -> Vec<BlockRow> {
    let mut blocks: BTreeMap<i64, i64> = BTreeMap::new();
    for row in rows {
        blocks.entry(row.block_number).or_insert(row.timestamp_unix);
    }
    blocks
        .into_iter()
        .map(|(block_number, timestamp_unix)| BlockRow {
            block_number,
            timestamp_unix,
        })
        .collect()
}

/// One row per distinct transaction id, ordered by block.
pub fn transaction_rows(rows: &[SwapRow]) -> Vec<TransactionRow> {
    let mut transactions: BTreeSet<(i64, String)> = BTreeSet::new();
    for row in rows {
        transactions.insert((row.block_number, row.transact_id.clone()));
    }
    transactions
        .into_iter()
        .map(|(block_number, id)| TransactionRow { id, block_number })
        .collect()
}
