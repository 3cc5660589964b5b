use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;

use crate::error::PipelineError;

/// Which pipeline the process runs (`RUN_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// GraphQL -> CSV chunks -> raw checkpoint upload.
    Collector,
    /// Raw checkpoints -> warehouse, then archive under `processed/`.
    Loader,
    /// GraphQL -> warehouse, no checkpoint files.
    Direct,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage_root: PathBuf,
    pub container: String,
    pub graph_url: String,
    pub run_mode: RunMode,
    pub sleep_mode: bool,
    pub work_dir: PathBuf,
    pub genesis_block: i64,
    pub page_size: usize,
    pub flush_row_threshold: usize,
    pub flush_dwell: Duration,
    pub head_lag: Duration,
    pub idle_wait: Duration,
    pub download_limit: usize,
    pub direct_batch_pages: usize,
    pub retry_max_times: usize,
    pub retry_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenv().ok();

        let database_url = require("DATABASE_URL")?;
        let storage_root = PathBuf::from(require("STORAGE_ROOT")?);

        let container = env::var("STORAGE_CONTAINER").unwrap_or_else(|_| "swapdata".to_string());
        let graph_url = env::var("GRAPH_URL").unwrap_or_else(|_| {
            "https://api.thegraph.com/subgraphs/name/traderjoe-xyz/exchange".to_string()
        });

        let run_mode = match env::var("RUN_MODE").as_deref() {
            Ok("loader") => RunMode::Loader,
            Ok("direct") => RunMode::Direct,
            Ok("collector") | Err(_) => RunMode::Collector,
            Ok(other) => {
                return Err(PipelineError::Config(format!("unknown RUN_MODE {other:?}")));
            }
        };

        let sleep_mode = env::var("SLEEP_MODE").is_ok();
        let work_dir = env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        Ok(Self {
            database_url,
            storage_root,
            container,
            graph_url,
            run_mode,
            sleep_mode,
            work_dir,
            genesis_block: env_or("GENESIS_BLOCK", 8_973_570),
            page_size: env_or("PAGE_SIZE", 100),
            flush_row_threshold: env_or("FLUSH_ROW_THRESHOLD", 3000),
            flush_dwell: Duration::from_secs(env_or("FLUSH_DWELL_SECS", 300)),
            head_lag: Duration::from_secs(env_or("HEAD_LAG_SECS", 30)),
            idle_wait: Duration::from_secs(env_or("IDLE_WAIT_SECS", 15)),
            download_limit: env_or("DOWNLOAD_LIMIT", 50),
            direct_batch_pages: env_or("DIRECT_BATCH_PAGES", 10),
            retry_max_times: env_or("RETRY_MAX_TIMES", 3),
            retry_delay: Duration::from_secs(env_or("RETRY_DELAY_SECS", 30)),
        })
    }
}

fn require(name: &str) -> Result<String, PipelineError> {
    env::var(name).map_err(|_| PipelineError::Config(format!("{name} is unset")))
}

fn env_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
