use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RunMode};
use crate::db::migration;
use crate::graph::models::{RawPair, RawPairRef, RawSwap, RawToken, RawTransaction};
use crate::graph::{ClientError, SwapSource};
use crate::models::SwapRow;

// Whitelisted token ids (WAVAX, USDC) plus a pair id and a token id that
// are not on the whitelist.
pub const WAVAX: &str = "0xb31f66aa3c1e785363f0875a1b74e27b85fd66c7";
pub const USDC: &str = "0xb97ef9ef8734c71904d8002f8b6bc66dd9c48a6e";
pub const OTHER_TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const PAIR_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const PAIR_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

/// One shared in-memory connection so every query sees the same database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migration::run_migrations(&pool).await.unwrap();
    pool
}

pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("swap_etl_{tag}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn test_config(work_dir: &Path, storage_root: &Path) -> Config {
    Config {
        database_url: "sqlite::memory:".into(),
        storage_root: storage_root.to_path_buf(),
        container: "swapdata".into(),
        graph_url: "http://localhost:1/graphql".into(),
        run_mode: RunMode::Loader,
        sleep_mode: false,
        work_dir: work_dir.to_path_buf(),
        genesis_block: 1,
        page_size: 100,
        flush_row_threshold: 3000,
        flush_dwell: Duration::from_secs(300),
        head_lag: Duration::from_secs(30),
        idle_wait: Duration::from_secs(1),
        download_limit: 50,
        direct_batch_pages: 10,
        retry_max_times: 0,
        retry_delay: Duration::from_millis(1),
    }
}

pub fn tx_id(n: u8) -> String {
    format!("0x{}", hex::encode([n; 32]))
}

/// A normalized swap with valid signs; `sell` controls the direction and
/// `amount` every non-zero column including `amountUSD`.
pub fn swap_row(block: i64, tx_n: u8, swap_number: i64, pair: &str, sell: bool, amount: u32) -> SwapRow {
    let amount = Decimal::from(amount);
    let zero = Decimal::ZERO;
    let (amount0_in, amount0_out, amount1_in, amount1_out) = if sell {
        (amount, zero, zero, amount)
    } else {
        (zero, amount, amount, zero)
    };
    SwapRow {
        transact_id: tx_id(tx_n),
        block_number: block,
        timestamp_unix: 1_700_000_000 + block,
        swap_number,
        pair_id: pair.to_string(),
        amount0_in,
        amount0_out,
        amount1_in,
        amount1_out,
        amount_usd: amount,
    }
}

pub fn raw_swap(tx_n: u8, swap_number: i64, pair: &str, sell: bool, amount: u32) -> RawSwap {
    let (amount0_in, amount0_out, amount1_in, amount1_out) = if sell {
        (amount, 0, 0, amount)
    } else {
        (0, amount, amount, 0)
    };
    RawSwap {
        id: format!("{}-{swap_number}", tx_id(tx_n)),
        amount_usd: amount.to_string(),
        amount0_in: amount0_in.to_string(),
        amount0_out: amount0_out.to_string(),
        amount1_in: amount1_in.to_string(),
        amount1_out: amount1_out.to_string(),
        pair: RawPairRef {
            id: pair.to_string(),
        },
    }
}

pub fn raw_transaction(block: i64, tx_n: u8, swaps: Vec<RawSwap>) -> RawTransaction {
    RawTransaction {
        id: tx_id(tx_n),
        timestamp: (1_700_000_000 + block).to_string(),
        block_number: block.to_string(),
        swaps,
    }
}

pub fn raw_pair(id: &str, name: &str, token0_id: &str, token1_id: &str) -> RawPair {
    RawPair {
        id: id.to_string(),
        name: name.to_string(),
        token0: RawToken {
            id: token0_id.to_string(),
            symbol: "T0".to_string(),
            name: "Token 0".to_string(),
        },
        token1: RawToken {
            id: token1_id.to_string(),
            symbol: "T1".to_string(),
            name: "Token 1".to_string(),
        },
    }
}

/// Canned swap source: serves queued transaction pages in order (then empty
/// pages), pairs from a fixed map, and counts pair fetches. Optionally
/// cancels a token once the queue runs dry, so pipeline run loops terminate.
pub struct FakeGraph {
    page_size: usize,
    pages: RefCell<VecDeque<Vec<RawTransaction>>>,
    pairs: HashMap<String, RawPair>,
    pub pair_fetches: RefCell<usize>,
    cancel_when_drained: Option<CancellationToken>,
}

impl FakeGraph {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: RefCell::new(VecDeque::new()),
            pairs: HashMap::new(),
            pair_fetches: RefCell::new(0),
            cancel_when_drained: None,
        }
    }

    pub fn with_page(mut self, page: Vec<RawTransaction>) -> Self {
        self.pages.get_mut().push_back(page);
        self
    }

    pub fn with_pair(mut self, pair: RawPair) -> Self {
        self.pairs.insert(pair.id.clone(), pair);
        self
    }

    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.cancel_when_drained = Some(token);
        self
    }
}

impl SwapSource for FakeGraph {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn fetch_transactions(
        &self,
        _min_block: i64,
    ) -> Result<Vec<RawTransaction>, ClientError> {
        let page = self.pages.borrow_mut().pop_front().unwrap_or_default();
        if page.is_empty() {
            if let Some(token) = &self.cancel_when_drained {
                token.cancel();
            }
        }
        Ok(page)
    }

    async fn fetch_pair(&self, id: &str) -> Result<Option<RawPair>, ClientError> {
        *self.pair_fetches.borrow_mut() += 1;
        Ok(self.pairs.get(id).cloned())
    }
}
