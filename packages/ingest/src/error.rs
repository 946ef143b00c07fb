//! Typed errors for the ingestion library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on failure classes when deciding terminal job status.

use thiserror::Error;

/// Errors that can occur while running an ingestion job.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Job record is missing or malformed fields
    #[error("invalid job spec: {reason}")]
    InvalidJobSpec { reason: String },

    /// No adapter registered for the requested source type
    #[error("unknown source type: {source_type}")]
    UnknownSourceType { source_type: String },

    /// Catalog page extraction produced no usable result
    #[error("scrape failed for {url}: {reason}")]
    ScrapeFailure { url: String, reason: String },

    /// Image URL retrieval failed on every allowed attempt
    #[error("image retrieval exhausted after {attempts} attempts: {url}")]
    ImageRetrievalExhausted { url: String, attempts: u32 },

    /// A uniqueness rule in the catalog was violated
    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    /// A single image could not be fetched or stored
    #[error("upload failed for {url}: {reason}")]
    Upload { url: String, reason: String },

    /// Browser session or page operation failed
    #[error("browser error: {0}")]
    Browser(String),

    /// Catalog or object storage backend failed
    #[error("storage error: {0}")]
    Storage(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
