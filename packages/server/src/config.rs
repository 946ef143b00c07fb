use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// S3-compatible endpoint objects are PUT to.
    pub storage_endpoint: String,
    pub storage_bucket: String,
    /// Base URL stored objects are publicly served from.
    pub storage_public_url: String,
    pub worker_concurrency: usize,
    pub job_max_attempts: i32,
    /// Six-field cron expression for the rescan task.
    pub rescan_cron: String,
    pub browser_headless: bool,
    pub poll_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            storage_endpoint: env::var("STORAGE_ENDPOINT")
                .context("STORAGE_ENDPOINT must be set")?,
            storage_bucket: env::var("STORAGE_BUCKET").context("STORAGE_BUCKET must be set")?,
            storage_public_url: env::var("STORAGE_PUBLIC_URL")
                .context("STORAGE_PUBLIC_URL must be set")?,
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("WORKER_CONCURRENCY must be a valid number")?,
            job_max_attempts: env::var("JOB_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("JOB_MAX_ATTEMPTS must be a valid number")?,
            // Daily at 03:00.
            rescan_cron: env::var("RESCAN_CRON").unwrap_or_else(|_| "0 0 3 * * *".to_string()),
            browser_headless: env::var("BROWSER_HEADLESS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("BROWSER_HEADLESS must be true or false")?,
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("POLL_INTERVAL_SECS must be a valid number")?,
        })
    }
}
