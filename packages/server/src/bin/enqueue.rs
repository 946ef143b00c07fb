// CLI for enqueueing ingestion jobs

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use server_core::{Config, EnqueueResult, PostgresJobQueue};

/// Enqueue a catalog ingestion job.
#[derive(Parser)]
#[command(name = "enqueue")]
struct Args {
    /// Catalog page URL to ingest
    #[arg(long)]
    url: String,

    /// Source type the URL belongs to (e.g. reapertrans, makima)
    #[arg(long)]
    source: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let queue = PostgresJobQueue::new(pool).with_max_attempts(config.job_max_attempts);
    match queue.enqueue(&args.url, &args.source).await? {
        EnqueueResult::Created(id) => println!("enqueued job {}", id),
        EnqueueResult::Duplicate(id) => println!("job {} already covers this URL", id),
    }

    Ok(())
}
