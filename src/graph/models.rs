//! Wire types for the subgraph responses. Numbers arrive as JSON strings and
//! stay strings here; parsing happens during normalization so a bad record
//! drops a row instead of failing a page.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GraphResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorItem {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsData {
    pub transactions: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct PairsData {
    pub pairs: Vec<RawPair>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(default)]
    pub swaps: Vec<RawSwap>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSwap {
    pub id: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: String,
    #[serde(rename = "amount0In")]
    pub amount0_in: String,
    #[serde(rename = "amount0Out")]
    pub amount0_out: String,
    #[serde(rename = "amount1In")]
    pub amount1_in: String,
    #[serde(rename = "amount1Out")]
    pub amount1_out: String,
    pub pair: RawPairRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPairRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPair {
    pub id: String,
    pub name: String,
    pub token0: RawToken,
    pub token1: RawToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawToken {
    pub id: String,
    pub symbol: String,
    pub name: String,
}
