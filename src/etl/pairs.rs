use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::csv_files;
use crate::error::PipelineError;
use crate::etl::whitelist;
use crate::graph::SwapSource;
use crate::models::CatalogRow;
use crate::storage::{ObjectStore, StorageError};

pub const CATALOG_FILE: &str = "pairs.csv";

/// The remote `pairs.csv` reference catalog: every pair ever observed by the
/// collector, with its underlying token metadata. Eligibility (both tokens
/// whitelisted) is decided once per pair and cached.
pub struct PairCatalog {
    eligibility: HashMap<String, bool>,
    local_path: PathBuf,
}

impl PairCatalog {
    /// Download the catalog (absent on first run) and build the eligibility
    /// map.
    pub async fn load<S: ObjectStore>(store: &S, work_dir: &Path) -> Result<Self, PipelineError> {
        let local_path = work_dir.join(CATALOG_FILE);
        let rows = match store.download(CATALOG_FILE, work_dir).await {
            Ok(path) => csv_files::read_rows::<CatalogRow>(&path)?,
            Err(StorageError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        csv_files::remove_file(&local_path);

        let eligibility = rows
            .into_iter()
            .map(|row| {
                let eligible = whitelist::pair_eligible(&row.token0_id, &row.token1_id);
                (row.pair_id.to_ascii_lowercase(), eligible)
            })
            .collect::<HashMap<_, _>>();
        info!(pairs = eligibility.len(), "pair catalog loaded");
        Ok(Self {
            eligibility,
            local_path,
        })
    }

    /// `None` means the pair has never been cataloged.
    pub fn is_eligible(&self, pair_id: &str) -> Option<bool> {
        self.eligibility.get(pair_id).copied()
    }

    /// Resolve uncataloged pairs against the upstream source and publish the
    /// extended catalog. Missing upstream metadata is fatal for that pair.
    pub async fn ensure_pairs<S: ObjectStore, G: SwapSource>(
        &mut self,
        store: &S,
        graph: &G,
        pair_ids: &[String],
    ) -> Result<(), PipelineError> {
        let to_add: Vec<&String> = pair_ids
            .iter()
            .filter(|id| !self.eligibility.contains_key(id.as_str()))
            .collect();
        if to_add.is_empty() {
            return Ok(());
        }
        info!(
            new = to_add.len(),
            known = self.eligibility.len(),
            "cataloging new pairs"
        );

        // Re-download the master so concurrent collectors lose nothing but
        // their own appends.
        match store.download(CATALOG_FILE, self.local_path.parent().unwrap_or(Path::new("."))).await
        {
            Ok(_) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        for pair_id in to_add {
            let pair = graph
                .fetch_pair(pair_id)
                .await?
                .ok_or_else(|| PipelineError::UnresolvedDimension(pair_id.clone()))?;
            let row = CatalogRow {
                pair_id: pair.id.to_ascii_lowercase(),
                name: pair.name.clone(),
                token0_id: pair.token0.id.to_ascii_lowercase(),
                token0_symbol: pair.token0.symbol.clone(),
                token0_name: pair.token0.name.clone(),
                token1_id: pair.token1.id.to_ascii_lowercase(),
                token1_symbol: pair.token1.symbol.clone(),
                token1_name: pair.token1.name.clone(),
            };
            let eligible = whitelist::pair_eligible(&row.token0_id, &row.token1_id);
            if !eligible {
                warn!(pair = %row.pair_id, name = %row.name, "pair not whitelisted, swaps will be dropped");
            }
            csv_files::append_rows(&self.local_path, std::slice::from_ref(&row))?;
            self.eligibility.insert(row.pair_id.clone(), eligible);
        }

        store.delete(CATALOG_FILE).await?;
        store.upload(&self.local_path, CATALOG_FILE).await?;
        csv_files::remove_file(&self.local_path);
        info!("pair catalog uploaded");
        Ok(())
    }
}
