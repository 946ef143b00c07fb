//! Diffs a scrape result against the catalog and persists what is new.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::models::{CatalogEntry, Chapter, NewCatalogEntry, NewChapter, RefKind};
use crate::error::Result;
use crate::traits::store::CatalogStore;
use crate::types::{NamedRef, ScrapeResult, ScrapedChapter};

/// What reconciliation did for one scrape.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub entry: CatalogEntry,
    pub created_entry: bool,
    /// Chapters created this run, in chronological order (oldest first),
    /// ready for image ingestion.
    pub new_chapters: Vec<Chapter>,
}

/// Turns scrape results into catalog records, creating only what the catalog
/// does not already know.
pub struct Reconciler {
    catalog: Arc<dyn CatalogStore>,
}

impl Reconciler {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Reconcile one scrape result.
    ///
    /// Known entry: chapters whose composed slug the catalog already holds
    /// are skipped; the remainder are numbered continuing from the existing
    /// count. Unknown entry: the entry, its reference links, and every
    /// chapter are created, numbered from 1.
    pub async fn reconcile(&self, scrape: &ScrapeResult) -> Result<ReconcileOutcome> {
        match self.catalog.entry_by_slug(&scrape.title_slug).await? {
            Some(entry) => {
                let known = self.catalog.chapter_slugs(entry.id).await?;
                let fresh = unknown_chapters(scrape, &entry.slug, &known);
                tracing::info!(
                    entry = %entry.slug,
                    known = known.len(),
                    new = fresh.len(),
                    "reconciled against existing entry"
                );
                let new_chapters = self
                    .create_chapters(&entry, &scrape.title_slug, fresh, known.len())
                    .await?;
                Ok(ReconcileOutcome {
                    entry,
                    created_entry: false,
                    new_chapters,
                })
            }
            None => {
                let entry = self
                    .catalog
                    .create_entry(NewCatalogEntry {
                        slug: scrape.title_slug.clone(),
                        title: scrape.title.clone(),
                        alternative_title: scrape.alternative_title.clone(),
                        description: scrape.description.clone(),
                        cover_image_url: scrape.cover_image_url.clone(),
                        serialization: scrape.serialization.clone(),
                    })
                    .await?;
                tracing::info!(entry = %entry.slug, "created catalog entry");

                self.link_references(&entry, scrape).await?;

                let fresh = unknown_chapters(scrape, &entry.slug, &HashSet::new());
                let new_chapters = self
                    .create_chapters(&entry, &scrape.title_slug, fresh, 0)
                    .await?;
                Ok(ReconcileOutcome {
                    entry,
                    created_entry: true,
                    new_chapters,
                })
            }
        }
    }

    /// Upsert and link the entry's reference values. Artists share the
    /// author reference set; status values describe the scrape, not the
    /// entry, and are not persisted.
    async fn link_references(&self, entry: &CatalogEntry, scrape: &ScrapeResult) -> Result<()> {
        let authors: Vec<&NamedRef> = scrape.authors.iter().chain(&scrape.artists).collect();
        self.link_kind(entry, RefKind::Author, &authors).await?;
        self.link_kind(entry, RefKind::Genre, &scrape.genres.iter().collect::<Vec<_>>())
            .await?;
        self.link_kind(entry, RefKind::Type, &scrape.kinds.iter().collect::<Vec<_>>())
            .await?;
        Ok(())
    }

    async fn link_kind(
        &self,
        entry: &CatalogEntry,
        kind: RefKind,
        references: &[&NamedRef],
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for reference in references {
            if reference.slug.is_empty() || !seen.insert(reference.slug.clone()) {
                continue;
            }
            let reference_id = self.catalog.upsert_reference(kind, reference).await?;
            self.catalog
                .link_reference(entry.id, kind, reference_id)
                .await?;
        }
        Ok(())
    }

    /// Create chapters in chronological order, numbering after `base`.
    async fn create_chapters(
        &self,
        entry: &CatalogEntry,
        catalog_slug: &str,
        mut fresh: Vec<ScrapedChapter>,
        base: usize,
    ) -> Result<Vec<Chapter>> {
        // Scrape order is newest first; persistence order is oldest first.
        fresh.reverse();

        let mut created = Vec::with_capacity(fresh.len());
        for (offset, scraped) in fresh.into_iter().enumerate() {
            let chapter = self
                .catalog
                .create_chapter(NewChapter {
                    catalog_entry_id: entry.id,
                    number: (base + offset + 1) as i32,
                    slug: scraped.composed_slug(catalog_slug),
                    title: scraped.title,
                    source_url: scraped.url,
                })
                .await?;
            created.push(chapter);
        }
        Ok(created)
    }
}

/// Chapters from the scrape the catalog does not know yet, still newest
/// first. Repeated composed slugs within one scrape keep only their first
/// occurrence so a repeated link cannot trip the unique-slug rule mid-job.
fn unknown_chapters(
    scrape: &ScrapeResult,
    catalog_slug: &str,
    known: &HashSet<String>,
) -> Vec<ScrapedChapter> {
    let mut seen = HashSet::new();
    scrape
        .chapters
        .iter()
        .filter(|chapter| {
            let slug = chapter.composed_slug(catalog_slug);
            !known.contains(&slug) && seen.insert(slug)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryCatalog;
    use crate::types::slugify;

    fn chapter(title: &str, url: &str) -> ScrapedChapter {
        ScrapedChapter {
            title: Some(title.to_string()),
            url: url.to_string(),
            slug_fragment: slugify(title),
        }
    }

    fn scrape_with_chapters(chapters: Vec<ScrapedChapter>) -> ScrapeResult {
        ScrapeResult {
            title: "Solo Leveling".to_string(),
            title_slug: "solo-leveling".to_string(),
            alternative_title: None,
            cover_image_url: "https://cdn.example.com/cover.jpg".to_string(),
            description: "A hunter grows stronger.".to_string(),
            serialization: None,
            authors: vec![NamedRef::new("Chugong")],
            artists: vec![NamedRef::new("Chugong"), NamedRef::new("Dubu")],
            genres: vec![NamedRef::new("Action")],
            kinds: vec![NamedRef::new("Manhwa")],
            statuses: vec![NamedRef::new("Ongoing")],
            chapters,
        }
    }

    #[tokio::test]
    async fn new_entry_gets_all_chapters_numbered_from_one() {
        let catalog = Arc::new(MemoryCatalog::new());
        let reconciler = Reconciler::new(catalog.clone());

        // Newest first, as scraped.
        let scrape = scrape_with_chapters(vec![
            chapter("Chapter 3", "https://example.com/ch-3"),
            chapter("Chapter 2", "https://example.com/ch-2"),
            chapter("Chapter 1", "https://example.com/ch-1"),
        ]);

        let outcome = reconciler.reconcile(&scrape).await.unwrap();
        assert!(outcome.created_entry);
        assert_eq!(outcome.new_chapters.len(), 3);
        assert_eq!(outcome.new_chapters[0].number, 1);
        assert_eq!(outcome.new_chapters[0].slug, "solo-leveling-chapter-1");
        assert_eq!(outcome.new_chapters[2].number, 3);

        // Artists fold into authors and duplicates collapse.
        assert_eq!(catalog.reference_count(RefKind::Author), 2);
        assert_eq!(catalog.reference_count(RefKind::Genre), 1);
        assert_eq!(catalog.reference_count(RefKind::Type), 1);
    }

    #[tokio::test]
    async fn known_entry_gets_only_unknown_chapters() {
        let catalog = Arc::new(MemoryCatalog::new());
        let reconciler = Reconciler::new(catalog.clone());

        let first = scrape_with_chapters(vec![
            chapter("c", "https://example.com/c"),
            chapter("b", "https://example.com/b"),
            chapter("a", "https://example.com/a"),
        ]);
        reconciler.reconcile(&first).await.unwrap();

        // Source now lists e, d, c, b, a (newest first).
        let second = scrape_with_chapters(vec![
            chapter("e", "https://example.com/e"),
            chapter("d", "https://example.com/d"),
            chapter("c", "https://example.com/c"),
            chapter("b", "https://example.com/b"),
            chapter("a", "https://example.com/a"),
        ]);
        let outcome = reconciler.reconcile(&second).await.unwrap();

        assert!(!outcome.created_entry);
        let slugs: Vec<(String, i32)> = outcome
            .new_chapters
            .iter()
            .map(|c| (c.slug.clone(), c.number))
            .collect();
        assert_eq!(
            slugs,
            vec![
                ("solo-leveling-d".to_string(), 4),
                ("solo-leveling-e".to_string(), 5),
            ]
        );
    }

    #[tokio::test]
    async fn repeated_chapter_links_collapse_within_one_scrape() {
        let catalog = Arc::new(MemoryCatalog::new());
        let reconciler = Reconciler::new(catalog.clone());

        let scrape = scrape_with_chapters(vec![
            chapter("Chapter 1", "https://example.com/ch-1"),
            chapter("Chapter 1", "https://example.com/ch-1-mirror"),
        ]);

        let outcome = reconciler.reconcile(&scrape).await.unwrap();
        assert_eq!(outcome.new_chapters.len(), 1);
        assert_eq!(outcome.new_chapters[0].source_url, "https://example.com/ch-1");
    }

    #[tokio::test]
    async fn rescan_with_no_new_chapters_is_a_no_op() {
        let catalog = Arc::new(MemoryCatalog::new());
        let reconciler = Reconciler::new(catalog.clone());

        let scrape = scrape_with_chapters(vec![chapter("a", "https://example.com/a")]);
        reconciler.reconcile(&scrape).await.unwrap();
        let outcome = reconciler.reconcile(&scrape).await.unwrap();

        assert!(!outcome.created_entry);
        assert!(outcome.new_chapters.is_empty());
    }
}
