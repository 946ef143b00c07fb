//! Worker pool: polls the queue and runs claimed jobs concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use uuid::Uuid;

use ingest::JobWorker;

use super::queue::{JobRecord, PostgresJobQueue};

/// Runner tuning.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Jobs processed concurrently per poll.
    pub concurrency: usize,
    /// How long to sleep when the queue is empty.
    pub poll_interval: Duration,
    pub worker_id: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

/// Claims batches of jobs and drives each through the pipeline.
///
/// Every claimed job ends in exactly one terminal queue update. Shutdown is
/// cooperative: in-flight jobs finish, then the loop exits.
pub struct JobRunner {
    queue: Arc<PostgresJobQueue>,
    worker: Arc<JobWorker>,
    config: RunnerConfig,
    shutdown: AtomicBool,
}

impl JobRunner {
    pub fn new(queue: Arc<PostgresJobQueue>, worker: Arc<JobWorker>, config: RunnerConfig) -> Self {
        Self {
            queue,
            worker,
            config,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Ask the run loop to stop after the current batch.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Run until shutdown is requested.
    pub async fn run(&self) {
        tracing::info!(
            worker_id = %self.config.worker_id,
            concurrency = self.config.concurrency,
            "job runner started"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            let jobs = match self
                .queue
                .claim(&self.config.worker_id, self.config.concurrency as i64)
                .await
            {
                Ok(jobs) => jobs,
                Err(error) => {
                    tracing::error!(error = %error, "failed to claim jobs");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            tracing::debug!(claimed = jobs.len(), "processing batch");
            join_all(jobs.into_iter().map(|job| self.process(job))).await;
        }

        tracing::info!(worker_id = %self.config.worker_id, "job runner stopped");
    }

    async fn process(&self, record: JobRecord) {
        let spec = record.spec();

        // Renew the lease while the job runs; a long chapter list must not
        // outlive its lease and get claimed by a second worker.
        let heartbeat = {
            let queue = self.queue.clone();
            let job_id = record.id;
            let every = self.queue.heartbeat_interval();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(error) = queue.heartbeat(job_id).await {
                        tracing::warn!(job_id = %job_id, error = %error, "lease renewal failed");
                    }
                }
            })
        };

        let outcome = self.worker.run(&spec).await;
        heartbeat.abort();

        match outcome {
            Ok(report) => {
                if let Err(error) = self.queue.mark_complete(record.id).await {
                    tracing::error!(job_id = %record.id, error = %error, "failed to mark job complete");
                } else {
                    tracing::info!(
                        job_id = %record.id,
                        new_chapters = report.new_chapters,
                        pages_stored = report.pages_stored,
                        "job complete"
                    );
                }
            }
            Err(error) => {
                let message = error.to_string();
                if let Err(update_error) = self.queue.mark_failed(record.id, &message).await {
                    tracing::error!(
                        job_id = %record.id,
                        error = %update_error,
                        "failed to mark job failed"
                    );
                } else {
                    tracing::warn!(job_id = %record.id, error = %message, "job failed");
                }
            }
        }
    }
}
