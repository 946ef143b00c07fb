//! Core domain types shared across the pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IngestError, Result};

/// A unit of ingestion work: one catalog page on one source site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: Uuid,
    pub source_url: String,
    pub source_type: String,
}

impl JobSpec {
    /// Check the spec is complete and well formed before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.source_type.trim().is_empty() {
            return Err(IngestError::InvalidJobSpec {
                reason: "source_type is empty".to_string(),
            });
        }
        match url::Url::parse(&self.source_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
            Ok(parsed) => Err(IngestError::InvalidJobSpec {
                reason: format!("unsupported URL scheme: {}", parsed.scheme()),
            }),
            Err(e) => Err(IngestError::InvalidJobSpec {
                reason: format!("invalid source_url: {}", e),
            }),
        }
    }
}

/// Summary of what a completed job actually did.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub entry_id: Uuid,
    /// True when this run created the catalog entry rather than updating it.
    pub created_entry: bool,
    pub new_chapters: usize,
    pub pages_stored: usize,
}

/// A named reference value (author, genre, publication type) with its slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
    pub slug: String,
}

impl NamedRef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Self { name, slug }
    }
}

/// One chapter link found on a catalog page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedChapter {
    pub title: Option<String>,
    pub url: String,
    /// Slug of the chapter title alone. Chapter identity is the composed
    /// slug, which prefixes this with the catalog slug.
    pub slug_fragment: String,
}

impl ScrapedChapter {
    /// The globally unique chapter identity within the catalog.
    pub fn composed_slug(&self, catalog_slug: &str) -> String {
        format!("{}-{}", catalog_slug, self.slug_fragment)
    }
}

/// Everything an adapter extracts from one catalog page.
///
/// `chapters` is in source page order: newest chapter first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub title: String,
    pub title_slug: String,
    pub alternative_title: Option<String>,
    pub cover_image_url: String,
    pub description: String,
    pub serialization: Option<String>,
    pub authors: Vec<NamedRef>,
    pub artists: Vec<NamedRef>,
    pub genres: Vec<NamedRef>,
    pub kinds: Vec<NamedRef>,
    pub statuses: Vec<NamedRef>,
    pub chapters: Vec<ScrapedChapter>,
}

/// Normalize free text into a URL-safe slug.
///
/// Lowercase, whitespace runs become single hyphens, everything outside
/// `[a-z0-9_-]` is dropped. Every slug in the system comes through here so
/// identity comparisons stay deterministic across sources.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_hyphen = false;
    for ch in text.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !last_was_hyphen {
                slug.push('-');
                last_was_hyphen = true;
            }
        } else if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            slug.push(ch);
            last_was_hyphen = ch == '-';
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Solo Leveling"), "solo-leveling");
        assert_eq!(slugify("Chapter 101"), "chapter-101");
    }

    #[test]
    fn slugify_collapses_whitespace_runs() {
        assert_eq!(slugify("A   Returner's    Magic"), "a-returners-magic");
    }

    #[test]
    fn slugify_strips_special_characters() {
        assert_eq!(slugify("Omniscient Reader's Viewpoint!"), "omniscient-readers-viewpoint");
        assert_eq!(slugify("Re:Zero"), "rezero");
    }

    #[test]
    fn composed_slug_prefixes_catalog_slug() {
        let chapter = ScrapedChapter {
            title: Some("Chapter 12".to_string()),
            url: "https://example.com/ch-12".to_string(),
            slug_fragment: "chapter-12".to_string(),
        };
        assert_eq!(chapter.composed_slug("solo-leveling"), "solo-leveling-chapter-12");
    }

    #[test]
    fn validate_rejects_bad_specs() {
        let mut spec = JobSpec {
            id: Uuid::new_v4(),
            source_url: "https://example.com/manga/x".to_string(),
            source_type: "reapertrans".to_string(),
        };
        assert!(spec.validate().is_ok());

        spec.source_type = "  ".to_string();
        assert!(matches!(spec.validate(), Err(IngestError::InvalidJobSpec { .. })));

        spec.source_type = "reapertrans".to_string();
        spec.source_url = "not a url".to_string();
        assert!(matches!(spec.validate(), Err(IngestError::InvalidJobSpec { .. })));

        spec.source_url = "file:///etc/passwd".to_string();
        assert!(matches!(spec.validate(), Err(IngestError::InvalidJobSpec { .. })));
    }
}
