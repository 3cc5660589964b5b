use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_etl::config::{Config, RunMode};
use swap_etl::db::{connection, migration};
use swap_etl::error::PipelineError;
use swap_etl::etl::{collector::Collector, direct::DirectPipeline, loader::EtlLoader};
use swap_etl::graph::GraphClient;
use swap_etl::storage::FsObjectStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "pipeline failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PipelineError> {
    let config = Config::from_env()?;
    info!(mode = ?config.run_mode, "starting");

    // Parked deployments keep the container alive without touching any
    // storage or warehouse state.
    if config.sleep_mode {
        info!("sleep mode, pipeline disabled");
        loop {
            tokio::time::sleep(Duration::from_secs(300)).await;
            info!("sleeping");
        }
    }

    let store = FsObjectStore::new(config.storage_root.join(&config.container));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    match config.run_mode {
        RunMode::Collector => {
            let graph = GraphClient::new(&config);
            let mut collector = Collector::new(config, graph, store).await?;
            collector.run(shutdown).await
        }
        RunMode::Loader => {
            let pool = connection::establish_pool(&config.database_url).await?;
            migration::run_migrations(&pool).await?;
            let mut loader = EtlLoader::new(config, pool, store).await?;
            loader.run(shutdown).await
        }
        RunMode::Direct => {
            let pool = connection::establish_pool(&config.database_url).await?;
            migration::run_migrations(&pool).await?;
            let graph = GraphClient::new(&config);
            let mut pipeline = DirectPipeline::new(config, pool, graph).await?;
            pipeline.run(shutdown).await
        }
    }
}
