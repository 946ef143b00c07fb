//! Catalog persistence trait.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::catalog::models::{
    CatalogEntry, Chapter, NewCatalogEntry, NewChapter, NewPage, PageRecord, RefKind,
};
use crate::error::Result;
use crate::types::NamedRef;

/// Persistence seam for catalog entries, chapters, pages, and reference sets.
///
/// Implementations enforce uniqueness (entry slugs, chapter slugs, page
/// numbers within a chapter) and surface violations as
/// [`IngestError::PersistenceConflict`](crate::IngestError::PersistenceConflict).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up an entry by its slug.
    async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>>;

    /// Create a new entry. Fails with a conflict if the slug exists.
    async fn create_entry(&self, entry: NewCatalogEntry) -> Result<CatalogEntry>;

    /// Replace an entry's cover image URL.
    async fn set_cover_image(&self, entry_id: Uuid, url: &str) -> Result<()>;

    /// Create the reference if its slug is unknown, returning its id either way.
    async fn upsert_reference(&self, kind: RefKind, reference: &NamedRef) -> Result<Uuid>;

    /// Associate an entry with a reference. Linking twice is a no-op.
    async fn link_reference(&self, entry_id: Uuid, kind: RefKind, reference_id: Uuid)
        -> Result<()>;

    /// All composed chapter slugs currently known for an entry.
    async fn chapter_slugs(&self, entry_id: Uuid) -> Result<HashSet<String>>;

    /// Create a chapter. Fails with a conflict if the slug exists.
    async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter>;

    /// Create a page record. Fails with a conflict on a duplicate page number.
    async fn create_page(&self, page: NewPage) -> Result<PageRecord>;
}
