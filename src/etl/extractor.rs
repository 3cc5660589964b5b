use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::graph::models::{RawSwap, RawTransaction};
use crate::models::SwapRow;

/// Normalizes raw transaction pages into [`SwapRow`]s.
///
/// Overlapping fetches are expected (the boundary block is always
/// re-fetched), so every emitted row is recorded in a composite-key set
/// `(block, transaction_id, swap_number)` and suppressed on re-appearance.
/// Rows that fail validation (sign invariant, unparseable fields) are
/// dropped, never errored.
pub struct SwapExtractor {
    page_size: usize,
    seen: HashSet<(i64, String, i64)>,
    max_block_processed: i64,
}

impl SwapExtractor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            seen: HashSet::new(),
            max_block_processed: 0,
        }
    }

    /// Normalize one page, ascending by block number.
    ///
    /// When the page is exactly at the transport's maximum size, the highest
    /// block may be cut off mid-block, so it is excluded here and re-fetched
    /// by the next call.
    pub fn parse_page(&mut self, page: &[RawTransaction]) -> Vec<SwapRow> {
        if page.is_empty() {
            return Vec::new();
        }

        let mut max_block = page
            .iter()
            .filter_map(|t| t.block_number.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        if page.len() >= self.page_size {
            max_block -= 1;
            debug!(
                excluded_block = max_block + 1,
                "full page, excluding possibly incomplete last block"
            );
        }
        if max_block > self.max_block_processed {
            self.max_block_processed = max_block;
        }

        let mut rows = Vec::new();
        for transaction in page {
            let Ok(block_number) = transaction.block_number.parse::<i64>() else {
                warn!(id = %transaction.id, "transaction with unparseable block number");
                continue;
            };
            if block_number > max_block {
                continue;
            }
            let Ok(timestamp_unix) = transaction.timestamp.parse::<i64>() else {
                warn!(id = %transaction.id, "transaction with unparseable timestamp");
                continue;
            };

            for swap in &transaction.swaps {
                let Some(row) =
                    normalize_swap(swap, &transaction.id, block_number, timestamp_unix)
                else {
                    continue;
                };
                let key = (block_number, transaction.id.clone(), row.swap_number);
                if !self.seen.insert(key) {
                    continue;
                }
                rows.push(row);
            }
        }
        rows
    }

    /// Highest block fully covered by previous pages; the next fetch should
    /// start one past it. `None` before any data has been seen.
    pub fn next_block(&self) -> Option<i64> {
        (self.max_block_processed > 0).then_some(self.max_block_processed + 1)
    }

    /// Drop dedup state for blocks below `block`; those can never reappear
    /// in a fetch once the cursor has moved past them.
    pub fn prune_below(&mut self, block: i64) {
        self.seen.retain(|key| key.0 >= block);
    }
}

fn normalize_swap(
    swap: &RawSwap,
    transact_id: &str,
    block_number: i64,
    timestamp_unix: i64,
) -> Option<SwapRow> {
    // Composite swap id: "<transaction hash>-<swap number>".
    let swap_number = swap
        .id
        .find('-')
        .and_then(|pos| swap.id[pos + 1..].parse::<i64>().ok());
    let Some(swap_number) = swap_number else {
        warn!(id = %swap.id, "swap with unparseable composite id");
        return None;
    };

    let amounts = [
        &swap.amount0_in,
        &swap.amount0_out,
        &swap.amount1_in,
        &swap.amount1_out,
        &swap.amount_usd,
    ]
    .map(|raw| Decimal::from_str(raw).ok());
    let [Some(amount0_in), Some(amount0_out), Some(amount1_in), Some(amount1_out), Some(amount_usd)] =
        amounts
    else {
        warn!(id = %swap.id, "swap with unparseable amounts");
        return None;
    };

    let row = SwapRow {
        transact_id: transact_id.to_string(),
        block_number,
        timestamp_unix,
        swap_number,
        pair_id: swap.pair.id.to_ascii_lowercase(),
        amount0_in,
        amount0_out,
        amount1_in,
        amount1_out,
        amount_usd,
    };

    row.has_valid_signs().then_some(row)
}
