//! Server-side wiring for the catalog ingestion pipeline: configuration,
//! the Postgres job queue and catalog store, S3-compatible object storage,
//! the worker pool, and the daily rescan scheduler.

pub mod config;
pub mod jobs;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use config::Config;
pub use jobs::{EnqueueResult, JobRecord, JobRunner, JobStatus, PostgresJobQueue, RunnerConfig};
pub use scheduler::start_scheduler;
pub use storage::HttpObjectStore;
pub use store::PostgresCatalog;
