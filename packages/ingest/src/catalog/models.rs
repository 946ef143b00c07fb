//! Persisted catalog records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A series in the catalog, identified by its slug.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub alternative_title: Option<String>,
    pub description: String,
    pub cover_image_url: String,
    pub serialization: Option<String>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a catalog entry.
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub slug: String,
    pub title: String,
    pub alternative_title: Option<String>,
    pub description: String,
    pub cover_image_url: String,
    pub serialization: Option<String>,
}

/// A chapter belonging to a catalog entry.
///
/// `number` is the 1-based chronological position; `slug` is the composed
/// catalog+chapter slug and is unique across the whole catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub id: Uuid,
    pub catalog_entry_id: Uuid,
    pub number: i32,
    pub slug: String,
    pub title: Option<String>,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a chapter.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub catalog_entry_id: Uuid,
    pub number: i32,
    pub slug: String,
    pub title: Option<String>,
    pub source_url: String,
}

/// One stored page image within a chapter.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub page_number: i32,
    pub image_url: String,
}

/// Fields required to create a page record.
#[derive(Debug, Clone)]
pub struct NewPage {
    pub chapter_id: Uuid,
    pub page_number: i32,
    pub image_url: String,
}

/// The reference sets a catalog entry can link to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Author,
    Genre,
    Type,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Author => "author",
            RefKind::Genre => "genre",
            RefKind::Type => "type",
        }
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
