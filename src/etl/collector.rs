use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::csv_files;
use crate::error::PipelineError;
use crate::etl::batch::{self, BatchWriter, PROCESSED_PREFIX, RAW_PREFIX};
use crate::etl::extractor::SwapExtractor;
use crate::etl::pairs::PairCatalog;
use crate::graph::SwapSource;
use crate::storage::ObjectStore;

/// Highest block covered by a checkpoint already in storage. Raw
/// checkpoints win over archived ones, since the loader only archives what
/// it has consumed. 0 when storage holds nothing yet.
pub async fn last_uploaded_block<S: ObjectStore>(store: &S) -> Result<i64, PipelineError> {
    let raw = store.list(RAW_PREFIX, ".csv").await?;
    if let Some(block) = raw.iter().rev().find_map(|n| batch::parse_block_number(n)) {
        return Ok(block);
    }
    let processed = store
        .list(&format!("{PROCESSED_PREFIX}/{RAW_PREFIX}"), ".csv")
        .await?;
    Ok(processed
        .iter()
        .rev()
        .find_map(|n| batch::parse_block_number(n))
        .unwrap_or(0))
}

/// The collector pipeline: page the upstream source, normalize and filter,
/// stage rows into per-block chunk files, and upload closed batches as raw
/// checkpoints. The cursor is re-derived from storage at startup, so the
/// process carries no state of its own.
pub struct Collector<S: ObjectStore, G: SwapSource> {
    config: Config,
    graph: G,
    store: S,
    extractor: SwapExtractor,
    writer: BatchWriter,
    catalog: PairCatalog,
    current_block: i64,
    last_record_unix: i64,
}

impl<S: ObjectStore, G: SwapSource> Collector<S, G> {
    pub async fn new(config: Config, graph: G, store: S) -> Result<Self, PipelineError> {
        // Local chunks from a previous crash were never uploaded; their
        // blocks are past the cursor and will be re-fetched, so stale files
        // must not pollute the next batch.
        csv_files::clear_csv_files(&config.work_dir)?;

        let uploaded = last_uploaded_block(&store).await?;
        let current_block = (uploaded + 1).max(config.genesis_block);
        info!(uploaded, current_block, "collector starting");

        let writer = BatchWriter::new(&config.work_dir)?;
        let catalog = PairCatalog::load(&store, &config.work_dir).await?;
        let extractor = SwapExtractor::new(graph.page_size());
        Ok(Self {
            config,
            graph,
            store,
            extractor,
            writer,
            catalog,
            current_block,
            last_record_unix: 0,
        })
    }

    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        loop {
            if shutdown.is_cancelled() {
                self.writer.flush(&self.store).await?;
                info!("collector stopped");
                return Ok(());
            }

            let page = self.graph.fetch_transactions(self.current_block).await?;
            if page.is_empty() {
                debug!(block = self.current_block, "no transactions past cursor");
                self.writer.flush(&self.store).await?;
                if wait_or_cancelled(&shutdown, self.config.idle_wait).await {
                    continue;
                }
                info!("collector stopped");
                return Ok(());
            }

            if let Some(last) = page.last() {
                if let Ok(ts) = last.timestamp.parse::<i64>() {
                    self.last_record_unix = ts;
                }
            }

            let mut rows = self.extractor.parse_page(&page);
            let mut unknown: Vec<String> = rows
                .iter()
                .filter(|r| self.catalog.is_eligible(&r.pair_id).is_none())
                .map(|r| r.pair_id.clone())
                .collect();
            unknown.sort();
            unknown.dedup();
            self.catalog
                .ensure_pairs(&self.store, &self.graph, &unknown)
                .await?;
            rows.retain(|r| self.catalog.is_eligible(&r.pair_id) == Some(true));

            self.writer.append(&rows)?;
            if self
                .writer
                .should_flush(self.config.flush_row_threshold, self.config.flush_dwell)
            {
                self.writer.flush(&self.store).await?;
            }

            if let Some(next) = self.extractor.next_block() {
                self.current_block = next;
                self.extractor.prune_below(next);
            }

            if let Some(wait) = self.head_lag_wait() {
                // Caught up with the head of the source. Anything staged is
                // worth uploading before parking.
                debug!(?wait, "caught up, throttling");
                self.writer.flush(&self.store).await?;
                if !wait_or_cancelled(&shutdown, wait).await {
                    info!("collector stopped");
                    return Ok(());
                }
            }
        }
    }

    /// How long to park so the last seen record is at least `head_lag` old.
    /// `None` while the backlog is deep enough that no pause is needed.
    fn head_lag_wait(&self) -> Option<Duration> {
        if self.last_record_unix == 0 {
            return None;
        }
        let age = chrono::Utc::now().timestamp() - self.last_record_unix;
        let lag = self.config.head_lag.as_secs() as i64;
        (age < lag).then(|| Duration::from_secs((lag - age) as u64))
    }
}

/// Sleep for `wait`, returning `false` when cancellation fired instead.
pub(crate) async fn wait_or_cancelled(shutdown: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}
