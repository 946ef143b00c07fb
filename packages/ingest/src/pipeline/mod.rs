//! The ingestion pipeline: one job in, catalog records and stored images out.

pub mod images;
pub mod worker;

pub use images::{ChapterIngestor, IngestorConfig, RetryPolicy};
pub use worker::JobWorker;
