use std::path::PathBuf;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::csv_files;
use crate::db::warehouse;
use crate::error::PipelineError;
use crate::etl::aggregate;
use crate::etl::batch::{self, RAW_PREFIX};
use crate::etl::collector::wait_or_cancelled;
use crate::etl::dimensions::DimensionCache;
use crate::models::SwapRow;
use crate::storage::ObjectStore;

/// The loader pipeline: consume raw checkpoints past the warehouse cursor,
/// aggregate and insert them, then archive the consumed checkpoints under
/// `processed/`. The cursor is the highest block in the fact table, so a
/// crash between insert and archive only causes a harmless replay.
pub struct EtlLoader<S: ObjectStore> {
    config: Config,
    pool: SqlitePool,
    store: S,
    dims: DimensionCache,
    max_block_uploaded: i64,
    raw_dir: PathBuf,
}

impl<S: ObjectStore> EtlLoader<S> {
    pub async fn new(config: Config, pool: SqlitePool, store: S) -> Result<Self, PipelineError> {
        let mut dims = DimensionCache::load(&pool).await?;
        dims.refresh_from_catalog(&pool, &store, &config.work_dir)
            .await?;
        let max_block_uploaded = warehouse::max_fact_block(&pool).await?;
        info!(max_block_uploaded, "loader starting");

        let raw_dir = config.work_dir.join("raw");
        std::fs::create_dir_all(&raw_dir)?;
        Ok(Self {
            config,
            pool,
            store,
            dims,
            max_block_uploaded,
            raw_dir,
        })
    }

    /// One pass: download, load, archive. Returns the number of checkpoints
    /// consumed; 0 means storage holds nothing past the cursor.
    pub async fn run_cycle(&mut self) -> Result<usize, PipelineError> {
        csv_files::clear_csv_files(&self.raw_dir)?;

        let mut names: Vec<String> = self
            .store
            .list(RAW_PREFIX, ".csv")
            .await?
            .into_iter()
            .filter(|n| batch::parse_block_number(n).is_some_and(|b| b > self.max_block_uploaded))
            .collect();
        names.sort();
        names.truncate(self.config.download_limit);
        if names.is_empty() {
            return Ok(0);
        }
        info!(
            checkpoints = names.len(),
            cursor = self.max_block_uploaded,
            "consuming raw checkpoints"
        );

        let mut local_paths = Vec::with_capacity(names.len());
        let mut rows: Vec<SwapRow> = Vec::new();
        for name in &names {
            let path = self.store.download(name, &self.raw_dir).await?;
            rows.extend(csv_files::read_rows::<SwapRow>(&path)?);
            local_paths.push(path);
        }

        // The cursor advances to the highest block any checkpoint covers,
        // even when every row of it gets filtered out below; the checkpoint
        // is consumed either way.
        let last_block_covered = rows
            .iter()
            .map(|r| r.block_number)
            .max()
            .or_else(|| names.iter().rev().find_map(|n| batch::parse_block_number(n)))
            .unwrap_or(self.max_block_uploaded);

        let before = rows.len();
        rows.retain(|r| {
            r.block_number > self.max_block_uploaded
                && r.has_valid_signs()
                && self.dims.pair_idx(&r.pair_id).is_some()
        });
        if rows.len() < before {
            debug!(dropped = before - rows.len(), "rows filtered before load");
        }

        let blocks = aggregate::block_rows(&rows);
        let mut facts = Vec::new();
        for fact in aggregate::aggregate_swaps(&rows) {
            let Some(pair_idx) = self.dims.pair_idx(&fact.pair_id) else {
                return Err(PipelineError::UnresolvedDimension(fact.pair_id));
            };
            facts.push((pair_idx, fact));
        }

        if facts.is_empty() {
            warn!(checkpoints = names.len(), "checkpoints held no loadable rows");
        } else {
            warehouse::load_batch(&self.pool, &blocks, &[], &facts).await?;
            info!(
                blocks = blocks.len(),
                facts = facts.len(),
                last_block = last_block_covered,
                "batch loaded"
            );
        }
        self.max_block_uploaded = self.max_block_uploaded.max(last_block_covered);

        batch::archive_processed(&self.store, &local_paths, &names, &self.config.work_dir).await?;
        Ok(names.len())
    }

    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        loop {
            if shutdown.is_cancelled() {
                info!("loader stopped");
                return Ok(());
            }
            let consumed = self.run_cycle().await?;
            if consumed == 0 {
                debug!("no checkpoints past cursor, idling");
                if !wait_or_cancelled(&shutdown, self.config.idle_wait).await {
                    info!("loader stopped");
                    return Ok(());
                }
            }
        }
    }
}
