//! CSV checkpoint helpers. All files carry a header row; append only writes
//! headers when it creates the file.

use std::fs::{self, OpenOptions};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::PipelineError;

pub fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    if rows.is_empty() {
        return Ok(());
    }
    let write_headers = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_headers)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    if !path.exists() || fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Concatenate `sources` (in the given order) into `dest`, writing one
/// header row.
pub fn combine_files<T: Serialize + DeserializeOwned>(
    sources: &[impl AsRef<Path>],
    dest: &Path,
) -> Result<(), PipelineError> {
    let mut combined: Vec<T> = Vec::new();
    for source in sources {
        combined.extend(read_rows(source.as_ref())?);
    }
    write_rows(dest, &combined)
}

pub fn remove_file(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "could not remove file");
        }
    }
}

/// Delete every `.csv` directly under `dir`. Leftovers from a previous run
/// are stale by definition; the pipeline re-derives everything it needs.
pub fn clear_csv_files(dir: &Path) -> Result<(), PipelineError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            remove_file(&path);
        }
    }
    Ok(())
}
