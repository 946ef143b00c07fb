//! Per-site extraction adapters.
//!
//! Each adapter knows how to read one source site's catalog page: it runs an
//! in-page script that returns a raw payload of plain strings, and the shared
//! conversion here turns that into a [`ScrapeResult`]. Slug derivation always
//! happens host-side through [`slugify`] so every source normalizes
//! identically. Adding a source means writing an adapter and registering it;
//! nothing else in the pipeline changes.

pub mod makima;
pub mod reapertrans;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::browser::BrowserPage;
use crate::error::{IngestError, Result};
use crate::types::{NamedRef, ScrapeResult, ScrapedChapter, slugify};

pub use makima::MakimaAdapter;
pub use reapertrans::ReaperTransAdapter;

/// Extracts a [`ScrapeResult`] from one source site's catalog page.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The `source_type` string jobs use to select this adapter.
    fn source_type(&self) -> &'static str;

    /// Navigate to `url` on the given page and extract the catalog data.
    async fn scrape(&self, page: &dyn BrowserPage, url: &str) -> Result<ScrapeResult>;
}

impl std::fmt::Debug for dyn SourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SourceAdapter").field(&self.source_type()).finish()
    }
}

/// Maps `source_type` strings to registered adapters.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own `source_type`.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.source_type(), adapter);
    }

    /// Resolve the adapter for a source type.
    pub fn get(&self, source_type: &str) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(source_type)
            .cloned()
            .ok_or_else(|| IngestError::UnknownSourceType {
                source_type: source_type.to_string(),
            })
    }

    pub fn source_types(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }
}

/// Raw payload the in-page scripts return: plain strings only, no slugs.
#[derive(Debug, Deserialize)]
pub(crate) struct RawScrape {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub alternative_title: String,
    #[serde(default)]
    pub cover_image_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub serialization: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<RawChapter>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChapter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: String,
}

const FALLBACK_CHAPTER_TITLE: &str = "chapter-title";

fn named_refs(names: Vec<String>) -> Vec<NamedRef> {
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map(NamedRef::new)
        .collect()
}

fn optional(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Convert a raw in-page payload into the normalized scrape result.
///
/// Fails with `ScrapeFailure` when the page yielded no title, which is the
/// signal the selectors matched nothing.
pub(crate) fn into_scrape_result(raw: RawScrape, source_url: &str) -> Result<ScrapeResult> {
    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return Err(IngestError::ScrapeFailure {
            url: source_url.to_string(),
            reason: "page yielded no title".to_string(),
        });
    }
    let title_slug = slugify(&title);
    if title_slug.is_empty() {
        return Err(IngestError::ScrapeFailure {
            url: source_url.to_string(),
            reason: format!("title produced an empty slug: {:?}", title),
        });
    }

    let chapters = raw
        .chapters
        .into_iter()
        .filter(|chapter| !chapter.url.trim().is_empty())
        .map(|chapter| {
            let title = chapter.title.and_then(optional);
            let slug_fragment =
                slugify(title.as_deref().unwrap_or(FALLBACK_CHAPTER_TITLE));
            ScrapedChapter {
                title,
                url: chapter.url.trim().to_string(),
                slug_fragment,
            }
        })
        .collect();

    Ok(ScrapeResult {
        title,
        title_slug,
        alternative_title: optional(raw.alternative_title),
        cover_image_url: raw.cover_image_url.trim().to_string(),
        description: raw.description.trim().to_string(),
        serialization: optional(raw.serialization),
        authors: named_refs(raw.authors),
        artists: named_refs(raw.artists),
        genres: named_refs(raw.genres),
        kinds: named_refs(raw.kinds),
        statuses: named_refs(raw.statuses),
        chapters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_from(value: serde_json::Value) -> RawScrape {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn conversion_derives_slugs_host_side() {
        let raw = raw_from(json!({
            "title": "  Solo Leveling ",
            "authors": ["Chugong", "  "],
            "genres": ["Action", "Sci Fi"],
            "chapters": [
                { "title": "Chapter 2", "url": "https://example.com/ch-2" },
                { "title": null, "url": "https://example.com/ch-1" },
                { "title": "Chapter 0", "url": "" }
            ]
        }));

        let result = into_scrape_result(raw, "https://example.com/manga/solo").unwrap();
        assert_eq!(result.title, "Solo Leveling");
        assert_eq!(result.title_slug, "solo-leveling");
        assert_eq!(result.authors.len(), 1);
        assert_eq!(result.authors[0].slug, "chugong");
        assert_eq!(result.genres[1].slug, "sci-fi");

        // Empty chapter URLs are dropped; untitled chapters fall back.
        assert_eq!(result.chapters.len(), 2);
        assert_eq!(result.chapters[0].slug_fragment, "chapter-2");
        assert_eq!(result.chapters[1].slug_fragment, "chapter-title");
    }

    #[test]
    fn conversion_rejects_missing_title() {
        let raw = raw_from(json!({ "title": "   " }));
        let err = into_scrape_result(raw, "https://example.com/x").unwrap_err();
        assert!(matches!(err, IngestError::ScrapeFailure { .. }));
    }

    #[test]
    fn registry_resolves_by_source_type() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(ReaperTransAdapter));
        registry.register(Arc::new(MakimaAdapter));

        assert_eq!(registry.get("reapertrans").unwrap().source_type(), "reapertrans");
        assert_eq!(registry.get("makima").unwrap().source_type(), "makima");

        let err = registry.get("mangadex").unwrap_err();
        assert!(matches!(err, IngestError::UnknownSourceType { .. }));
    }
}
