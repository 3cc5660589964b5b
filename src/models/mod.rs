use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One normalized swap, keyed by `(transact_id, swap_number)`. This is the
/// CSV checkpoint row format; amount column names follow the upstream
/// GraphQL field names so checkpoints stay readable against the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRow {
    pub transact_id: String,
    pub block_number: i64,
    pub timestamp_unix: i64,
    pub swap_number: i64,
    pub pair_id: String,
    #[serde(rename = "amount0In")]
    pub amount0_in: Decimal,
    #[serde(rename = "amount0Out")]
    pub amount0_out: Decimal,
    #[serde(rename = "amount1In")]
    pub amount1_in: Decimal,
    #[serde(rename = "amount1Out")]
    pub amount1_out: Decimal,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
}

impl SwapRow {
    /// Exactly one side in, the opposite side out. Anything else is a
    /// malformed swap and gets dropped, not errored.
    pub fn has_valid_signs(&self) -> bool {
        let zero = Decimal::ZERO;
        (self.amount0_in > zero
            && self.amount1_out > zero
            && self.amount0_out == zero
            && self.amount1_in == zero)
            || (self.amount0_out > zero
                && self.amount1_in > zero
                && self.amount0_in == zero
                && self.amount1_out == zero)
    }

    /// Sell = token0 flowing in.
    pub fn is_sell(&self) -> bool {
        self.amount0_in > Decimal::ZERO
    }
}

/// Row for `dim_blocks`. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub block_number: i64,
    pub timestamp_unix: i64,
}

/// Row for `dim_transactions`; `id` is the 32-byte transaction hash as a
/// `0x`-prefixed hex string until the warehouse boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    pub id: String,
    pub block_number: i64,
}

/// Aggregated fact row: one per `(block_number, pair, direction)`, amounts
/// summed over the contributing swaps.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub block_number: i64,
    pub pair_id: String,
    pub is_sell: bool,
    pub amount0_in: Decimal,
    pub amount0_out: Decimal,
    pub amount1_in: Decimal,
    pub amount1_out: Decimal,
    pub amount_usd: Decimal,
}

/// One line of the remote `pairs.csv` reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub pair_id: String,
    pub name: String,
    pub token0_id: String,
    pub token0_symbol: String,
    pub token0_name: String,
    pub token1_id: String,
    pub token1_symbol: String,
    pub token1_name: String,
}
