//! Catalog Ingestion Pipeline
//!
//! Turns a `{source URL, source type}` job into persisted catalog records:
//! browser-driven extraction of a series page, reconciliation of its chapter
//! list against what the catalog already knows, and ordered ingestion of each
//! new chapter's page images into object storage.
//!
//! # Design
//!
//! - Per-site knowledge lives in [`adapters`]; everything downstream of the
//!   scrape is source-agnostic.
//! - All identity is slug-based and derived host-side, so two adapters can
//!   never disagree about normalization.
//! - Storage, object storage, image fetching, and the browser are trait
//!   seams; [`stores::memory`] and [`testing`] provide in-process
//!   implementations for tests.
//!
//! # Modules
//!
//! - [`adapters`] - Per-site extraction ([`adapters::SourceAdapter`], registry)
//! - [`browser`] - Browser abstraction and the chromiumoxide implementation
//! - [`catalog`] - Catalog records and the reconciler
//! - [`pipeline`] - Job worker and chapter image ingestion
//! - [`stores`] - In-memory storage implementations
//! - [`traits`] - Persistence and fetching seams
//! - [`testing`] - Scriptable doubles for tests

pub mod adapters;
pub mod browser;
pub mod catalog;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{IngestError, Result};
pub use types::{slugify, JobReport, JobSpec, NamedRef, ScrapeResult, ScrapedChapter};

pub use adapters::{AdapterRegistry, MakimaAdapter, ReaperTransAdapter, SourceAdapter};
pub use browser::{
    chromium::{ChromiumBrowser, ChromiumConfig},
    Browser, BrowserPage, BrowserSession,
};
pub use catalog::{
    CatalogEntry, Chapter, NewCatalogEntry, NewChapter, NewPage, PageRecord, ReconcileOutcome,
    Reconciler, RefKind,
};
pub use pipeline::{ChapterIngestor, IngestorConfig, JobWorker, RetryPolicy};
pub use stores::{MemoryCatalog, MemoryObjectStore};
pub use traits::{CatalogStore, FetchedImage, HttpImageFetcher, ImageFetcher, ObjectStore};
