use std::collections::{HashMap, HashSet};
use std::path::Path;

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::csv_files;
use crate::db::warehouse;
use crate::error::PipelineError;
use crate::etl::pairs::CATALOG_FILE;
use crate::etl::whitelist;
use crate::graph::SwapSource;
use crate::models::CatalogRow;
use crate::storage::{ObjectStore, StorageError};

/// In-memory mirror of the warehouse dimension tables: identity to surrogate
/// key. Loaded once at startup; new entries are upserted through it so the
/// mirror never goes stale.
pub struct DimensionCache {
    tokens: HashMap<String, i64>,
    pairs: HashMap<String, i64>,
    ineligible: HashSet<String>,
}

impl DimensionCache {
    pub async fn load(pool: &SqlitePool) -> Result<Self, PipelineError> {
        let tokens = warehouse::token_map(pool).await?;
        let pairs = warehouse::pair_map(pool).await?;
        info!(
            tokens = tokens.len(),
            pairs = pairs.len(),
            "dimension cache loaded"
        );
        Ok(Self {
            tokens,
            pairs,
            ineligible: HashSet::new(),
        })
    }

    pub fn pair_idx(&self, pair_id: &str) -> Option<i64> {
        self.pairs.get(pair_id).copied()
    }

    /// Seed the dimension tables from the remote `pairs.csv` catalog,
    /// restricted to whitelisted pairs. An empty catalog after filtering
    /// means the warehouse could never resolve a single fact, which is a
    /// configuration problem, not a data gap.
    pub async fn refresh_from_catalog<S: ObjectStore>(
        &mut self,
        pool: &SqlitePool,
        store: &S,
        work_dir: &Path,
    ) -> Result<(), PipelineError> {
        let rows = match store.download(CATALOG_FILE, work_dir).await {
            Ok(path) => {
                let rows = csv_files::read_rows::<CatalogRow>(&path)?;
                csv_files::remove_file(&path);
                rows
            }
            Err(StorageError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let eligible: Vec<CatalogRow> = rows
            .into_iter()
            .filter(|row| whitelist::pair_eligible(&row.token0_id, &row.token1_id))
            .collect();
        if eligible.is_empty() {
            return Err(PipelineError::EmptyCatalog);
        }

        let mut added = 0;
        for row in &eligible {
            let pair_id = row.pair_id.to_ascii_lowercase();
            if self.pairs.contains_key(&pair_id) {
                continue;
            }
            let token0_idx = self
                .upsert_token(pool, &row.token0_id, &row.token0_symbol, &row.token0_name)
                .await?;
            let token1_idx = self
                .upsert_token(pool, &row.token1_id, &row.token1_symbol, &row.token1_name)
                .await?;
            let pair_idx =
                warehouse::upsert_pair(pool, &pair_id, &row.name, token0_idx, token1_idx).await?;
            self.pairs.insert(pair_id, pair_idx);
            added += 1;
        }
        info!(
            eligible = eligible.len(),
            added, "dimensions refreshed from catalog"
        );
        Ok(())
    }

    /// Resolve a pair id to its surrogate key, fetching and upserting its
    /// metadata on first sight. `Ok(None)` means the pair is not whitelisted
    /// and its swaps should be dropped; an unresolvable pair is fatal.
    pub async fn resolve_pair<G: SwapSource>(
        &mut self,
        pool: &SqlitePool,
        graph: &G,
        pair_id: &str,
    ) -> Result<Option<i64>, PipelineError> {
        if let Some(idx) = self.pairs.get(pair_id) {
            return Ok(Some(*idx));
        }
        if self.ineligible.contains(pair_id) {
            return Ok(None);
        }

        let pair = graph
            .fetch_pair(pair_id)
            .await?
            .ok_or_else(|| PipelineError::UnresolvedDimension(pair_id.to_string()))?;
        if !whitelist::pair_eligible(&pair.token0.id, &pair.token1.id) {
            debug!(pair = %pair_id, name = %pair.name, "pair not whitelisted");
            self.ineligible.insert(pair_id.to_string());
            return Ok(None);
        }

        let token0_idx = self
            .upsert_token(pool, &pair.token0.id, &pair.token0.symbol, &pair.token0.name)
            .await?;
        let token1_idx = self
            .upsert_token(pool, &pair.token1.id, &pair.token1.symbol, &pair.token1.name)
            .await?;
        let key = pair.id.to_ascii_lowercase();
        let pair_idx = warehouse::upsert_pair(pool, &key, &pair.name, token0_idx, token1_idx).await?;
        info!(pair = %key, name = %pair.name, pair_idx, "new pair resolved");
        self.pairs.insert(key, pair_idx);
        Ok(Some(pair_idx))
    }

    async fn upsert_token(
        &mut self,
        pool: &SqlitePool,
        id: &str,
        symbol: &str,
        name: &str,
    ) -> Result<i64, PipelineError> {
        let key = id.to_ascii_lowercase();
        if let Some(idx) = self.tokens.get(&key) {
            return Ok(*idx);
        }
        let idx = warehouse::upsert_token(pool, &key, symbol, name).await?;
        self.tokens.insert(key, idx);
        Ok(idx)
    }
}
