use thiserror::Error;

use crate::graph::client::ClientError;
use crate::storage::StorageError;

/// Top-level pipeline error. Fatal conditions bubble up to `main`, which owns
/// the single process exit point; everything recoverable is handled lower
/// down (dropped rows, integrity re-checks, bounded transport retries).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("graph client error: {0}")]
    Client(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("unresolved dimension for pair {0}")]
    UnresolvedDimension(String),

    #[error("pair catalog is empty after whitelist filter")]
    EmptyCatalog,

    #[error("insert retry exhausted for blocks {first}..={last}")]
    IntegrityRetryExhausted { first: i64, last: i64 },
}
