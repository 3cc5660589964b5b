use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::db::warehouse;
use crate::error::PipelineError;
use crate::etl::aggregate;
use crate::etl::collector::wait_or_cancelled;
use crate::etl::dimensions::DimensionCache;
use crate::etl::extractor::SwapExtractor;
use crate::graph::SwapSource;
use crate::models::SwapRow;

/// The direct pipeline: upstream source straight into the warehouse, no
/// checkpoint files. Pages accumulate and load as one batch, so a single
/// insert covers many blocks; the cursor is the warehouse fact table.
pub struct DirectPipeline<G: SwapSource> {
    config: Config,
    pool: SqlitePool,
    graph: G,
    dims: DimensionCache,
    extractor: SwapExtractor,
    current_block: i64,
    pending: Vec<SwapRow>,
    pages_accumulated: usize,
    last_record_unix: i64,
}

impl<G: SwapSource> DirectPipeline<G> {
    pub async fn new(config: Config, pool: SqlitePool, graph: G) -> Result<Self, PipelineError> {
        let dims = DimensionCache::load(&pool).await?;
        let loaded = warehouse::max_fact_block(&pool).await?;
        let current_block = (loaded + 1).max(config.genesis_block);
        info!(loaded, current_block, "direct pipeline starting");

        let extractor = SwapExtractor::new(graph.page_size());
        Ok(Self {
            config,
            pool,
            graph,
            dims,
            extractor,
            current_block,
            pending: Vec::new(),
            pages_accumulated: 0,
            last_record_unix: 0,
        })
    }

    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        loop {
            if shutdown.is_cancelled() {
                self.load_pending().await?;
                info!("direct pipeline stopped");
                return Ok(());
            }

            let page = self.graph.fetch_transactions(self.current_block).await?;
            if page.is_empty() {
                debug!(block = self.current_block, "no transactions past cursor");
                self.load_pending().await?;
                if wait_or_cancelled(&shutdown, self.config.idle_wait).await {
                    continue;
                }
                info!("direct pipeline stopped");
                return Ok(());
            }

            if let Some(last) = page.last() {
                if let Ok(ts) = last.timestamp.parse::<i64>() {
                    self.last_record_unix = ts;
                }
            }

            for row in self.extractor.parse_page(&page) {
                let resolved = self
                    .dims
                    .resolve_pair(&self.pool, &self.graph, &row.pair_id)
                    .await?;
                if resolved.is_some() {
                    self.pending.push(row);
                }
            }
            self.pages_accumulated += 1;

            if self.pages_accumulated >= self.config.direct_batch_pages {
                self.load_pending().await?;
            }

            if let Some(next) = self.extractor.next_block() {
                self.current_block = next;
                self.extractor.prune_below(next);
            }

            if let Some(wait) = self.head_lag_wait() {
                debug!(?wait, "caught up, throttling");
                self.load_pending().await?;
                if !wait_or_cancelled(&shutdown, wait).await {
                    info!("direct pipeline stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Load everything accumulated as one batch: blocks, transaction
    /// lineage, aggregated facts.
    async fn load_pending(&mut self) -> Result<(), PipelineError> {
        self.pages_accumulated = 0;
        if self.pending.is_empty() {
            return Ok(());
        }

        let blocks = aggregate::block_rows(&self.pending);
        let transactions = aggregate::transaction_rows(&self.pending);
        let mut facts = Vec::new();
        for fact in aggregate::aggregate_swaps(&self.pending) {
            let Some(pair_idx) = self.dims.pair_idx(&fact.pair_id) else {
                return Err(PipelineError::UnresolvedDimension(fact.pair_id));
            };
            facts.push((pair_idx, fact));
        }

        warehouse::load_batch(&self.pool, &blocks, &transactions, &facts).await?;
        info!(
            rows = self.pending.len(),
            blocks = blocks.len(),
            facts = facts.len(),
            "batch loaded"
        );
        self.pending.clear();
        Ok(())
    }

    fn head_lag_wait(&self) -> Option<Duration> {
        if self.last_record_unix == 0 {
            return None;
        }
        let age = chrono::Utc::now().timestamp() - self.last_record_unix;
        let lag = self.config.head_lag.as_secs() as i64;
        (age < lag).then(|| Duration::from_secs((lag - age) as u64))
    }
}
