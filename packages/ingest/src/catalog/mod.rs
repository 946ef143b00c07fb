//! Catalog records and reconciliation.

pub mod models;
pub mod reconciler;

pub use models::{
    CatalogEntry, Chapter, NewCatalogEntry, NewChapter, NewPage, PageRecord, RefKind,
};
pub use reconciler::{ReconcileOutcome, Reconciler};
