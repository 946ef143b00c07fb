// Main entry point for the ingestion server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingest::{
    AdapterRegistry, ChromiumBrowser, ChromiumConfig, HttpImageFetcher, IngestorConfig, JobWorker,
    MakimaAdapter, ReaperTransAdapter,
};
use server_core::{
    start_scheduler, Config, HttpObjectStore, JobRunner, PostgresCatalog, PostgresJobQueue,
    RunnerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,ingest=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting catalog ingestion server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Build pipeline components
    let catalog = Arc::new(PostgresCatalog::new(pool.clone()));
    let objects = Arc::new(HttpObjectStore::new(
        reqwest::Client::new(),
        config.storage_endpoint.clone(),
        config.storage_bucket.clone(),
        config.storage_public_url.clone(),
    ));
    let fetcher =
        Arc::new(HttpImageFetcher::new().context("Failed to build image fetch client")?);
    let browser = Arc::new(ChromiumBrowser::new(ChromiumConfig {
        headless: config.browser_headless,
        ..ChromiumConfig::default()
    }));

    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(ReaperTransAdapter));
    adapters.register(Arc::new(MakimaAdapter));
    tracing::info!(sources = ?adapters.source_types(), "adapters registered");

    let worker = Arc::new(JobWorker::new(
        adapters,
        browser,
        catalog,
        objects,
        fetcher,
        IngestorConfig::default(),
    ));

    let queue = Arc::new(
        PostgresJobQueue::new(pool.clone()).with_max_attempts(config.job_max_attempts),
    );

    // Start the rescan scheduler; keep the handle alive for the process.
    let mut scheduler = start_scheduler(queue.clone(), worker.clone(), &config.rescan_cron)
        .await
        .context("Failed to start scheduler")?;

    // Run the worker pool until ctrl-c
    let runner = Arc::new(JobRunner::new(
        queue,
        worker,
        RunnerConfig {
            concurrency: config.worker_concurrency,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            ..RunnerConfig::default()
        },
    ));

    let shutdown_runner = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing in-flight jobs");
            shutdown_runner.request_shutdown();
        }
    });

    runner.run().await;

    scheduler
        .shutdown()
        .await
        .context("Failed to stop scheduler")?;

    Ok(())
}
