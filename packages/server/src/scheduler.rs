//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The rescan task replays every completed job through the same pipeline the
//! runner uses. Reconciliation makes the replay incremental: already-known
//! chapters are skipped, so a rescan only ingests what the source added.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use ingest::JobWorker;

use crate::jobs::PostgresJobQueue;

const RESCAN_WORKER_ID: &str = "rescan";

/// Start all scheduled tasks
pub async fn start_scheduler(
    queue: Arc<PostgresJobQueue>,
    worker: Arc<JobWorker>,
    rescan_cron: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let rescan_queue = queue.clone();
    let rescan_worker = worker.clone();
    let rescan_job = Job::new_async(rescan_cron, move |_uuid, _lock| {
        let queue = rescan_queue.clone();
        let worker = rescan_worker.clone();
        Box::pin(async move {
            if let Err(e) = run_rescan(&queue, &worker).await {
                tracing::error!("Rescan task failed: {}", e);
            }
        })
    })?;

    scheduler.add(rescan_job).await?;
    scheduler.start().await?;

    tracing::info!(cron = %rescan_cron, "rescan scheduler started");
    Ok(scheduler)
}

/// Replay each completed job, sequentially, re-marking terminal status.
async fn run_rescan(queue: &PostgresJobQueue, worker: &JobWorker) -> Result<()> {
    let jobs = queue.completed().await?;
    if jobs.is_empty() {
        tracing::info!("no completed jobs to rescan");
        return Ok(());
    }

    tracing::info!(jobs = jobs.len(), "rescanning completed jobs");

    for record in jobs {
        queue.begin_rescan(record.id, RESCAN_WORKER_ID).await?;
        match worker.run(&record.spec()).await {
            Ok(report) => {
                queue.mark_complete(record.id).await?;
                if report.new_chapters > 0 {
                    tracing::info!(
                        job_id = %record.id,
                        new_chapters = report.new_chapters,
                        pages_stored = report.pages_stored,
                        "rescan found new chapters"
                    );
                }
            }
            Err(error) => {
                let message = error.to_string();
                queue.mark_failed(record.id, &message).await?;
                tracing::warn!(job_id = %record.id, error = %message, "rescan failed");
            }
        }
    }

    Ok(())
}
