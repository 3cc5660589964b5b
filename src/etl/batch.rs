use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::csv_files;
use crate::error::PipelineError;
use crate::models::SwapRow;
use crate::storage::ObjectStore;

pub const RAW_PREFIX: &str = "swaps_raw";
pub const PROCESSED_PREFIX: &str = "processed";

/// Checkpoint chunk name for a block: zero-padded so lexicographic order
/// matches numeric block order.
pub fn chunk_file_name(block_number: i64) -> String {
    format!("{RAW_PREFIX}_{block_number:010}.csv")
}

/// First run of digits in a checkpoint name, or `None` for foreign files.
pub fn parse_block_number(name: &str) -> Option<i64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Accumulates normalized rows into per-block chunk files and closes the
/// batch by row-count threshold or wall-clock dwell since the first row.
pub struct BatchWriter {
    dir: PathBuf,
    chunk_names: BTreeSet<String>,
    pending_rows: usize,
    first_row_at: Option<Instant>,
}

impl BatchWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            chunk_names: BTreeSet::new(),
            pending_rows: 0,
            first_row_at: None,
        })
    }

    pub fn pending_rows(&self) -> usize {
        self.pending_rows
    }

    pub fn chunk_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Append rows to their per-block chunk files.
    pub fn append(&mut self, rows: &[SwapRow]) -> Result<(), PipelineError> {
        if rows.is_empty() {
            return Ok(());
        }
        if self.first_row_at.is_none() {
            self.first_row_at = Some(Instant::now());
        }

        // Rows arrive ascending by block, so group into runs per chunk file.
        let mut start = 0;
        for i in 1..=rows.len() {
            if i == rows.len() || rows[i].block_number != rows[start].block_number {
                let name = chunk_file_name(rows[start].block_number);
                csv_files::append_rows(&self.chunk_path(&name), &rows[start..i])?;
                self.chunk_names.insert(name);
                start = i;
            }
        }
        self.pending_rows += rows.len();
        Ok(())
    }

    /// The batch closes when enough rows accumulated, or when the first row
    /// has been waiting longer than `dwell` (keeps low-volume periods
    /// uploading promptly).
    pub fn should_flush(&self, threshold: usize, dwell: Duration) -> bool {
        self.pending_rows >= threshold
            || self
                .first_row_at
                .is_some_and(|first| first.elapsed() >= dwell)
    }

    /// Combine pending chunks in block order into one artifact named after
    /// the last chunk, upload it, then delete the local chunks.
    pub async fn flush<S: ObjectStore>(
        &mut self,
        store: &S,
    ) -> Result<Option<String>, PipelineError> {
        let Some(last_name) = self.chunk_names.iter().next_back().cloned() else {
            return Ok(None);
        };

        let names: Vec<String> = self.chunk_names.iter().cloned().collect();
        let paths: Vec<PathBuf> = names.iter().map(|n| self.chunk_path(n)).collect();
        let combined_path = self.chunk_path(&last_name);

        info!(chunks = names.len(), artifact = %last_name, "flushing batch");
        csv_files::combine_files::<SwapRow>(&paths, &combined_path)?;
        store.upload(&combined_path, &last_name).await?;

        for path in &paths {
            csv_files::remove_file(path);
        }
        self.chunk_names.clear();
        self.pending_rows = 0;
        self.first_row_at = None;
        debug!(artifact = %last_name, "batch flushed");
        Ok(Some(last_name))
    }
}

/// Archive consumed raw checkpoints: combine them in sorted order, upload
/// the combined artifact under `processed/`, and only then delete the raw
/// remote chunks. A reader can therefore always see either the chunks or
/// the combined artifact, never neither.
pub async fn archive_processed<S: ObjectStore>(
    store: &S,
    local_paths: &[PathBuf],
    remote_names: &[String],
    work_dir: &Path,
) -> Result<(), PipelineError> {
    let Some(last_name) = remote_names.last() else {
        return Ok(());
    };

    let combined_path = work_dir.join(last_name);
    csv_files::combine_files::<SwapRow>(local_paths, &combined_path)?;

    let processed_name = format!("{PROCESSED_PREFIX}/{last_name}");
    info!(artifact = %processed_name, "uploading processed checkpoint");
    store.upload(&combined_path, &processed_name).await?;

    info!(count = remote_names.len(), "deleting raw checkpoints");
    for name in remote_names {
        store.delete(name).await?;
    }

    csv_files::remove_file(&combined_path);
    for path in local_paths {
        csv_files::remove_file(path);
    }
    Ok(())
}
