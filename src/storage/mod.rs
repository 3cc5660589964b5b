//! Blob-storage collaborator. The pipeline only ever talks to the
//! [`ObjectStore`] trait; `FsObjectStore` is the shipped implementation,
//! rooted at a local directory that stands in for a storage container.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Remote object names are slash-separated and relative to the container
/// root, e.g. `swaps_raw_0008973570.csv` or `processed/swaps_raw_….csv`.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// List object names matching `prefix`/`suffix`, sorted ascending.
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>, StorageError>;

    /// Upload a local file, replacing any existing object of the same name.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), StorageError>;

    /// Download an object into `dest_dir`; returns the local path.
    async fn download(&self, remote: &str, dest_dir: &Path) -> Result<PathBuf, StorageError>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, remote: &str) -> Result<(), StorageError>;
}

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>, StorageError> {
        // The prefix may address a sub-namespace ("processed/swaps_raw").
        let (dir_part, name_prefix) = match prefix.rsplit_once('/') {
            Some((dir, rest)) => (dir, rest),
            None => ("", prefix),
        };
        let dir = self.root.join(dir_part);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with(name_prefix) && file_name.ends_with(suffix) {
                if dir_part.is_empty() {
                    names.push(file_name);
                } else {
                    names.push(format!("{dir_part}/{file_name}"));
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), StorageError> {
        let target = self.object_path(remote);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if target.exists() {
            warn!(object = remote, "object already exists, replacing");
            tokio::fs::remove_file(&target).await?;
        }
        tokio::fs::copy(local, &target).await?;
        debug!(object = remote, "uploaded");
        Ok(())
    }

    async fn download(&self, remote: &str, dest_dir: &Path) -> Result<PathBuf, StorageError> {
        let source = self.object_path(remote);
        if !source.is_file() {
            return Err(StorageError::NotFound(remote.to_string()));
        }
        tokio::fs::create_dir_all(dest_dir).await?;
        let file_name = source
            .file_name()
            .ok_or_else(|| StorageError::NotFound(remote.to_string()))?;
        let dest = dest_dir.join(file_name);
        tokio::fs::copy(&source, &dest).await?;
        debug!(object = remote, "downloaded");
        Ok(dest)
    }

    async fn delete(&self, remote: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.object_path(remote)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
