//! In-memory storage implementations for testing and development.
//!
//! These enforce the same uniqueness rules the database schema does, so
//! conflict behavior can be exercised without Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use crate::catalog::models::{
    CatalogEntry, Chapter, NewCatalogEntry, NewChapter, NewPage, PageRecord, RefKind,
};
use crate::error::{IngestError, Result};
use crate::traits::objects::ObjectStore;
use crate::traits::store::CatalogStore;
use crate::types::NamedRef;

#[derive(Default)]
struct CatalogState {
    entries: HashMap<Uuid, CatalogEntry>,
    entry_slugs: HashMap<String, Uuid>,
    chapters: HashMap<Uuid, Chapter>,
    chapter_slugs: HashSet<String>,
    pages: Vec<PageRecord>,
    references: HashMap<(RefKind, String), Uuid>,
    links: HashSet<(Uuid, RefKind, Uuid)>,
}

/// In-memory catalog. Data is lost on drop; not for production.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.state.read().unwrap().entries.len()
    }

    /// Chapters of an entry, ordered by chapter number.
    pub fn chapters_for(&self, entry_id: Uuid) -> Vec<Chapter> {
        let state = self.state.read().unwrap();
        let mut chapters: Vec<Chapter> = state
            .chapters
            .values()
            .filter(|c| c.catalog_entry_id == entry_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.number);
        chapters
    }

    /// Pages of a chapter, ordered by page number.
    pub fn pages_for(&self, chapter_id: Uuid) -> Vec<PageRecord> {
        let state = self.state.read().unwrap();
        let mut pages: Vec<PageRecord> = state
            .pages
            .iter()
            .filter(|p| p.chapter_id == chapter_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }

    pub fn reference_count(&self, kind: RefKind) -> usize {
        self.state
            .read()
            .unwrap()
            .references
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn link_count(&self, entry_id: Uuid) -> usize {
        self.state
            .read()
            .unwrap()
            .links
            .iter()
            .filter(|(id, _, _)| *id == entry_id)
            .count()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        let state = self.state.read().unwrap();
        Ok(state
            .entry_slugs
            .get(slug)
            .and_then(|id| state.entries.get(id))
            .cloned())
    }

    async fn create_entry(&self, entry: NewCatalogEntry) -> Result<CatalogEntry> {
        let mut state = self.state.write().unwrap();
        if state.entry_slugs.contains_key(&entry.slug) {
            return Err(IngestError::PersistenceConflict(format!(
                "catalog entry slug already exists: {}",
                entry.slug
            )));
        }
        let now = Utc::now();
        let record = CatalogEntry {
            id: Uuid::new_v4(),
            slug: entry.slug,
            title: entry.title,
            alternative_title: entry.alternative_title,
            description: entry.description,
            cover_image_url: entry.cover_image_url,
            serialization: entry.serialization,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.entry_slugs.insert(record.slug.clone(), record.id);
        state.entries.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_cover_image(&self, entry_id: Uuid, url: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let entry = state.entries.get_mut(&entry_id).ok_or_else(|| {
            IngestError::Storage(format!("no catalog entry with id {}", entry_id))
        })?;
        entry.cover_image_url = url.to_string();
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_reference(&self, kind: RefKind, reference: &NamedRef) -> Result<Uuid> {
        let mut state = self.state.write().unwrap();
        let id = state
            .references
            .entry((kind, reference.slug.clone()))
            .or_insert_with(Uuid::new_v4);
        Ok(*id)
    }

    async fn link_reference(
        &self,
        entry_id: Uuid,
        kind: RefKind,
        reference_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.links.insert((entry_id, kind, reference_id));
        Ok(())
    }

    async fn chapter_slugs(&self, entry_id: Uuid) -> Result<HashSet<String>> {
        let state = self.state.read().unwrap();
        Ok(state
            .chapters
            .values()
            .filter(|c| c.catalog_entry_id == entry_id)
            .map(|c| c.slug.clone())
            .collect())
    }

    async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter> {
        let mut state = self.state.write().unwrap();
        if state.chapter_slugs.contains(&chapter.slug) {
            return Err(IngestError::PersistenceConflict(format!(
                "chapter slug already exists: {}",
                chapter.slug
            )));
        }
        let record = Chapter {
            id: Uuid::new_v4(),
            catalog_entry_id: chapter.catalog_entry_id,
            number: chapter.number,
            slug: chapter.slug,
            title: chapter.title,
            source_url: chapter.source_url,
            created_at: Utc::now(),
        };
        state.chapter_slugs.insert(record.slug.clone());
        state.chapters.insert(record.id, record.clone());
        if let Some(entry) = state.entries.get_mut(&record.catalog_entry_id) {
            entry.updated_at = record.created_at;
        }
        Ok(record)
    }

    async fn create_page(&self, page: NewPage) -> Result<PageRecord> {
        let mut state = self.state.write().unwrap();
        let duplicate = state
            .pages
            .iter()
            .any(|p| p.chapter_id == page.chapter_id && p.page_number == page.page_number);
        if duplicate {
            return Err(IngestError::PersistenceConflict(format!(
                "page {} already exists for chapter {}",
                page.page_number, page.chapter_id
            )));
        }
        let record = PageRecord {
            id: Uuid::new_v4(),
            chapter_id: page.chapter_id,
            page_number: page.page_number,
            image_url: page.image_url,
        };
        state.pages.push(record.clone());
        Ok(record)
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    size: usize,
}

/// In-memory object store. `put` returns `memory://{key}` URLs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .map(|o| o.content_type.clone())
    }

    pub fn size_of(&self, key: &str) -> Option<usize> {
        self.objects.read().unwrap().get(key).map(|o| o.size)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                size: bytes.len(),
            },
        );
        Ok(format!("memory://{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slug: &str) -> NewCatalogEntry {
        NewCatalogEntry {
            slug: slug.to_string(),
            title: slug.to_string(),
            alternative_title: None,
            description: String::new(),
            cover_image_url: String::new(),
            serialization: None,
        }
    }

    #[tokio::test]
    async fn duplicate_entry_slug_is_a_conflict() {
        let catalog = MemoryCatalog::new();
        catalog.create_entry(entry("solo-leveling")).await.unwrap();
        let err = catalog.create_entry(entry("solo-leveling")).await.unwrap_err();
        assert!(matches!(err, IngestError::PersistenceConflict(_)));
    }

    #[tokio::test]
    async fn duplicate_page_number_is_a_conflict() {
        let catalog = MemoryCatalog::new();
        let e = catalog.create_entry(entry("x")).await.unwrap();
        let chapter = catalog
            .create_chapter(NewChapter {
                catalog_entry_id: e.id,
                number: 1,
                slug: "x-chapter-1".to_string(),
                title: None,
                source_url: "https://example.com/ch-1".to_string(),
            })
            .await
            .unwrap();

        let page = NewPage {
            chapter_id: chapter.id,
            page_number: 1,
            image_url: "memory://x/1".to_string(),
        };
        catalog.create_page(page.clone()).await.unwrap();
        let err = catalog.create_page(page).await.unwrap_err();
        assert!(matches!(err, IngestError::PersistenceConflict(_)));
    }

    #[tokio::test]
    async fn upsert_reference_is_idempotent() {
        let catalog = MemoryCatalog::new();
        let reference = NamedRef::new("Action");
        let a = catalog.upsert_reference(RefKind::Genre, &reference).await.unwrap();
        let b = catalog.upsert_reference(RefKind::Genre, &reference).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(catalog.reference_count(RefKind::Genre), 1);
    }
}
