//! Upstream subgraph collaborator. The pipelines only ever talk to the
//! [`SwapSource`] trait; `GraphClient` is the shipped reqwest-backed
//! implementation.

pub mod client;
pub mod models;

use models::{RawPair, RawTransaction};

pub use client::{ClientError, GraphClient};

#[allow(async_fn_in_trait)]
pub trait SwapSource {
    /// Maximum records a single `fetch_transactions` call can return.
    fn page_size(&self) -> usize;

    /// Fetch transactions with `block_number >= min_block`, ascending by
    /// block number, at most one page.
    async fn fetch_transactions(&self, min_block: i64)
        -> Result<Vec<RawTransaction>, ClientError>;

    /// Fetch pair metadata by id. `None` means the source has no such pair.
    async fn fetch_pair(&self, id: &str) -> Result<Option<RawPair>, ClientError>;
}
