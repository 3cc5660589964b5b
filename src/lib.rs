pub mod config;
pub mod csv_files;
pub mod db;
pub mod error;
pub mod etl;
pub mod graph;
pub mod models;
pub mod storage;

#[cfg(test)]
pub mod tests;

pub use config::{Config, RunMode};
pub use error::PipelineError;
