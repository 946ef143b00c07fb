//! PostgreSQL-backed job queue.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so any number of runners can pull
//! from the same table safely. A claimed job holds a lease; if the worker
//! dies, the expired lease makes the job claimable again until its attempt
//! budget runs out, with the lease window doubling per attempt as backoff.
//! Runners renew the lease of in-flight jobs (`heartbeat`), so only a dead
//! worker lets a lease lapse.
//! Orderly failures are terminal: every execution ends in exactly one
//! `mark_complete` or `mark_failed`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ingest::JobSpec;

/// Lifecycle of a job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

/// One row in `ingest_jobs`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    pub source_url: String,
    pub source_type: String,
    pub status: JobStatus,
    pub attempt: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// The pipeline-facing view of this job.
    pub fn spec(&self) -> JobSpec {
        JobSpec {
            id: self.id,
            source_url: self.source_url.clone(),
            source_type: self.source_type.clone(),
        }
    }
}

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// Job was enqueued, returns new job ID
    Created(Uuid),
    /// An unfinished job for this URL already exists, returns its ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

const COLUMNS: &str = "id, source_url, source_type, status, attempt, max_attempts, \
     error_message, lease_expires_at, worker_id, created_at, updated_at";

/// PostgreSQL-backed job queue.
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_ms: i64,
    max_attempts: i32,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            // Jobs drive a real browser through whole chapter lists.
            lease_ms: 10 * 60 * 1000,
            max_attempts: 3,
        }
    }

    pub fn with_lease_ms(mut self, lease_ms: i64) -> Self {
        self.lease_ms = lease_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// How often a runner should renew the lease of a job it is processing.
    /// Half the lease window, so one missed beat never expires a live job.
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis((self.lease_ms / 2).max(1) as u64)
    }

    /// Enqueue an ingestion job.
    ///
    /// The source URL doubles as the idempotency key: if a pending or
    /// running job for it exists, that job is returned instead.
    pub async fn enqueue(&self, source_url: &str, source_type: &str) -> Result<EnqueueResult> {
        if let Some(existing) = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM ingest_jobs
            WHERE source_url = $1 AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(EnqueueResult::Duplicate(existing));
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ingest_jobs (id, source_url, source_type, status, attempt, max_attempts)
            VALUES ($1, $2, $3, 'pending', 0, $4)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_url)
        .bind(source_type)
        .bind(self.max_attempts)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(job_id = %id, url = %source_url, source = %source_type, "enqueued job");
        Ok(EnqueueResult::Created(id))
    }

    /// Claim up to `limit` runnable jobs for this worker.
    ///
    /// Runnable means pending, or running with an expired lease and attempts
    /// remaining (a previous worker died mid-job).
    pub async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<JobRecord>> {
        let sql = format!(
            r#"
            UPDATE ingest_jobs
            SET status = 'running',
                attempt = attempt + 1,
                worker_id = $1,
                lease_expires_at = NOW()
                    + make_interval(secs => $2 * power(2, least(attempt, 6)) / 1000.0),
                updated_at = NOW()
            WHERE id IN (
                SELECT id FROM ingest_jobs
                WHERE status = 'pending'
                   OR (status = 'running'
                       AND lease_expires_at < NOW()
                       AND attempt < max_attempts)
                ORDER BY created_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {COLUMNS}
            "#,
            COLUMNS = COLUMNS
        );
        let jobs = sqlx::query_as::<_, JobRecord>(&sql)
            .bind(worker_id)
            .bind(self.lease_ms as f64)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    /// Extend the lease of a running job.
    pub async fn heartbeat(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET lease_expires_at = NOW() + make_interval(secs => $1 / 1000.0),
                updated_at = NOW()
            WHERE id = $2 AND status = 'running'
            "#,
        )
        .bind(self.lease_ms as f64)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal success.
    pub async fn mark_complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'complete',
                error_message = NULL,
                lease_expires_at = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal failure.
    pub async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'failed',
                error_message = $1,
                lease_expires_at = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All completed jobs, oldest first. The rescan task replays these.
    pub async fn completed(&self) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM ingest_jobs WHERE status = 'complete' ORDER BY created_at",
            COLUMNS = COLUMNS
        );
        let jobs = sqlx::query_as::<_, JobRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    /// Move a completed job back to running for a rescan pass. Leaves the
    /// attempt count alone; rescans are not retries.
    pub async fn begin_rescan(&self, job_id: Uuid, worker_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = 'running',
                worker_id = $1,
                lease_expires_at = NOW() + make_interval(secs => $2 / 1000.0),
                updated_at = NOW()
            WHERE id = $3 AND status = 'complete'
            "#,
        )
        .bind(worker_id)
        .bind(self.lease_ms as f64)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Jobs that are pending or running.
    pub async fn count_in_flight(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ingest_jobs WHERE status IN ('pending', 'running')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heartbeat_interval_is_half_the_lease() {
        let pool = PgPool::connect_lazy("postgres://localhost/ingest_test").unwrap();
        let queue = PostgresJobQueue::new(pool).with_lease_ms(10 * 60 * 1000);
        assert_eq!(
            queue.heartbeat_interval(),
            std::time::Duration::from_secs(5 * 60)
        );

        // Degenerate leases still produce a usable tick.
        let pool = PgPool::connect_lazy("postgres://localhost/ingest_test").unwrap();
        let queue = PostgresJobQueue::new(pool).with_lease_ms(1);
        assert!(queue.heartbeat_interval() >= std::time::Duration::from_millis(1));
    }

    #[test]
    fn enqueue_result_helpers() {
        let created = EnqueueResult::Created(Uuid::new_v4());
        assert!(created.is_created());
        assert_eq!(created.job_id(), created.job_id());

        let duplicate = EnqueueResult::Duplicate(Uuid::new_v4());
        assert!(!duplicate.is_created());
    }

    #[test]
    fn job_record_converts_to_spec() {
        let record = JobRecord {
            id: Uuid::new_v4(),
            source_url: "https://reaper.example.com/manga/x".to_string(),
            source_type: "reapertrans".to_string(),
            status: JobStatus::Pending,
            attempt: 0,
            max_attempts: 3,
            error_message: None,
            lease_expires_at: None,
            worker_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let spec = record.spec();
        assert_eq!(spec.id, record.id);
        assert_eq!(spec.source_type, "reapertrans");
        assert!(spec.validate().is_ok());
    }
}
