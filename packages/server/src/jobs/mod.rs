//! Job queue and worker pool.

pub mod queue;
pub mod runner;

pub use queue::{EnqueueResult, JobRecord, JobStatus, PostgresJobQueue};
pub use runner::{JobRunner, RunnerConfig};
