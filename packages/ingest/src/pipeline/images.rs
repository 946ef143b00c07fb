//! Chapter image ingestion.
//!
//! Two steps per chapter. Step one retrieves the ordered image URLs from the
//! reader page: navigate, scroll to the bottom so lazy loaders fire, wait
//! until every reader image has decoded, then collect `data-src || src` per
//! image in DOM order. The whole step retries on any failure up to a bound.
//! Step two fetches and stores each image concurrently; page numbers are
//! fixed from source order before the fan-out, so completion order never
//! affects them, and a failed page is logged and skipped rather than failing
//! the chapter.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::browser::BrowserPage;
use crate::catalog::models::{CatalogEntry, Chapter, NewPage};
use crate::error::{IngestError, Result};
use crate::traits::fetch::ImageFetcher;
use crate::traits::objects::ObjectStore;
use crate::traits::store::CatalogStore;

/// Returns every reader page image URL in DOM order, preferring the
/// lazy-load attribute over the live one. Only direct children of the reader
/// count as pages; nested images are thumbnails and ads.
pub const COLLECT_IMAGE_URLS: &str = "Array.from(document.querySelectorAll('#readerarea > img'))\
    .map((img) => img.getAttribute('data-src') || img.getAttribute('src') || '')";

/// True once every reader page image has fetched and decoded.
pub const IMAGES_DECODED: &str = "Array.from(document.querySelectorAll('#readerarea > img'))\
    .every((img) => img.complete && img.naturalHeight > 0)";

/// Bounded retry for the URL-retrieval step.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Tuning for chapter ingestion.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub retry: RetryPolicy,
    /// How long to wait for all reader images to decode after scrolling.
    pub load_timeout: Duration,
    /// Pixels per scroll step while triggering lazy loads.
    pub scroll_step: u32,
    pub scroll_delay: Duration,
    /// Concurrent image uploads per chapter.
    pub upload_concurrency: usize,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            load_timeout: Duration::from_secs(60),
            scroll_step: 800,
            scroll_delay: Duration::from_millis(100),
            upload_concurrency: 8,
        }
    }
}

/// Ingests the images of one chapter.
pub struct ChapterIngestor {
    catalog: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn ImageFetcher>,
    config: IngestorConfig,
}

impl ChapterIngestor {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ImageFetcher>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            catalog,
            objects,
            fetcher,
            config,
        }
    }

    /// Ingest every page image of `chapter`, returning how many were stored.
    pub async fn ingest(
        &self,
        page: &dyn BrowserPage,
        entry: &CatalogEntry,
        chapter: &Chapter,
    ) -> Result<usize> {
        let urls = self.image_urls_with_retry(page, &chapter.source_url).await?;
        tracing::info!(chapter = %chapter.slug, pages = urls.len(), "retrieved image urls");

        let stored = stream::iter(urls.into_iter().enumerate().map(|(index, url)| {
            // Page number comes from source order, never completion order.
            let page_number = (index + 1) as i32;
            async move {
                match self.store_page(entry, chapter, page_number, &url).await {
                    Ok(()) => 1usize,
                    Err(error) => {
                        tracing::warn!(
                            chapter = %chapter.slug,
                            page = page_number,
                            url = %url,
                            error = %error,
                            "skipping page after failed ingest"
                        );
                        0
                    }
                }
            }
        }))
        .buffer_unordered(self.config.upload_concurrency)
        .fold(0usize, |total, stored| async move { total + stored })
        .await;

        Ok(stored)
    }

    /// Fetch the entry's cover from its source URL and rewrite the record to
    /// the stored copy.
    pub async fn store_cover(&self, entry: &CatalogEntry) -> Result<()> {
        if entry.cover_image_url.is_empty() {
            return Ok(());
        }
        let image = self.fetcher.fetch(&entry.cover_image_url).await?;
        let key = format!(
            "{}/cover/{}.{}",
            entry.title,
            Uuid::new_v4(),
            extension_for(&image.content_type)
        );
        let url = self.objects.put(&key, &image.content_type, image.bytes).await?;
        self.catalog.set_cover_image(entry.id, &url).await
    }

    async fn store_page(
        &self,
        entry: &CatalogEntry,
        chapter: &Chapter,
        page_number: i32,
        url: &str,
    ) -> Result<()> {
        let image = self.fetcher.fetch(url).await?;
        let key = format!(
            "{}/{}/{}.{}",
            entry.title,
            chapter.title.as_deref().unwrap_or("chapter"),
            Uuid::new_v4(),
            extension_for(&image.content_type)
        );
        let image_url = self.objects.put(&key, &image.content_type, image.bytes).await?;
        self.catalog
            .create_page(NewPage {
                chapter_id: chapter.id,
                page_number,
                image_url,
            })
            .await?;
        Ok(())
    }

    async fn image_urls_with_retry(
        &self,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<Vec<String>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.collect_image_urls(page, url).await {
                Ok(urls) => return Ok(urls),
                Err(error) => {
                    tracing::warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.config.retry.max_attempts,
                        error = %error,
                        "image retrieval attempt failed"
                    );
                    if attempt >= self.config.retry.max_attempts {
                        return Err(IngestError::ImageRetrievalExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                        });
                    }
                    tokio::time::sleep(self.config.retry.retry_delay).await;
                }
            }
        }
    }

    async fn collect_image_urls(&self, page: &dyn BrowserPage, url: &str) -> Result<Vec<String>> {
        page.navigate(url).await?;
        self.scroll_to_bottom(page).await?;
        page.wait_for(IMAGES_DECODED, self.config.load_timeout).await?;

        let value = page.evaluate(COLLECT_IMAGE_URLS).await?;
        let urls: Vec<String> = serde_json::from_value(value)?;
        Ok(urls.into_iter().filter(|u| !u.is_empty()).collect())
    }

    /// Scroll in fixed steps until the position stops moving, which is the
    /// bottom of the page (or a reader that no longer grows).
    async fn scroll_to_bottom(&self, page: &dyn BrowserPage) -> Result<()> {
        let script = format!(
            "window.scrollBy(0, {}); Math.round(window.scrollY)",
            self.config.scroll_step
        );
        let mut previous: Option<i64> = None;
        loop {
            let value = page.evaluate(&script).await?;
            let position = value.as_i64().ok_or_else(|| {
                IngestError::Browser("scroll position was not a number".to_string())
            })?;
            if previous == Some(position) {
                return Ok(());
            }
            previous = Some(position);
            tokio::time::sleep(self.config.scroll_delay).await;
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/avif" => "avif",
        _ => "jpg",
    }
}
