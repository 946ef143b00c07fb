//! End-to-end pipeline tests over scriptable doubles and in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use ingest::testing::{MockBrowser, MockImageFetcher};
use ingest::{
    AdapterRegistry, CatalogStore, IngestError, IngestorConfig, JobSpec, JobWorker, MemoryCatalog,
    MemoryObjectStore, ReaperTransAdapter, RetryPolicy,
};

const CATALOG_URL: &str = "https://reaper.example.com/manga/solo-leveling";

struct Harness {
    browser: MockBrowser,
    catalog: Arc<MemoryCatalog>,
    objects: Arc<MemoryObjectStore>,
    fetcher: Arc<MockImageFetcher>,
    worker: JobWorker,
}

fn harness(browser: MockBrowser, fetcher: MockImageFetcher) -> Harness {
    let config = fast_config();
    let catalog = Arc::new(MemoryCatalog::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let fetcher = Arc::new(fetcher);

    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(ReaperTransAdapter));

    let worker = JobWorker::new(
        adapters,
        Arc::new(browser.clone()),
        catalog.clone(),
        objects.clone(),
        fetcher.clone(),
        config,
    );

    Harness {
        browser,
        catalog,
        objects,
        fetcher,
        worker,
    }
}

fn fast_config() -> IngestorConfig {
    IngestorConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
        },
        load_timeout: Duration::from_millis(100),
        scroll_delay: Duration::from_millis(1),
        ..IngestorConfig::default()
    }
}

fn job() -> JobSpec {
    JobSpec {
        id: Uuid::new_v4(),
        source_url: CATALOG_URL.to_string(),
        source_type: "reapertrans".to_string(),
    }
}

fn scrape_payload(chapter_titles: &[&str]) -> serde_json::Value {
    // Newest first, like a real chapter list.
    let chapters: Vec<_> = chapter_titles
        .iter()
        .map(|title| {
            json!({
                "title": title,
                "url": format!("https://reaper.example.com/{}", title.replace(' ', "-")),
            })
        })
        .collect();
    json!({
        "title": "Solo Leveling",
        "alternative_title": "Na Honjaman Lebel-eob",
        "cover_image_url": "https://cdn.example.com/solo-cover.jpg",
        "description": "A hunter grows stronger.",
        "serialization": "KakaoPage",
        "authors": ["Chugong"],
        "artists": ["Dubu"],
        "genres": ["Action", "Fantasy"],
        "kinds": ["Manhwa"],
        "statuses": ["Ongoing"],
        "chapters": chapters,
    })
}

fn chapter_url(title: &str) -> String {
    format!("https://reaper.example.com/{}", title.replace(' ', "-"))
}

fn image_urls(chapter: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://cdn.example.com/{}/{:03}.jpg", chapter, i))
        .collect()
}

#[tokio::test]
async fn full_job_for_a_new_title() {
    // Three chapters with 5, 4, and 6 pages.
    let mut browser = MockBrowser::new().with_scrape(
        CATALOG_URL,
        scrape_payload(&["Chapter 3", "Chapter 2", "Chapter 1"]),
    );
    for (title, pages) in [("Chapter 1", 5), ("Chapter 2", 4), ("Chapter 3", 6)] {
        let urls = image_urls(title, pages);
        browser = browser.with_images(chapter_url(title), urls.iter().map(|s| s.as_str()).collect());
    }

    let h = harness(browser, MockImageFetcher::new());
    let report = h.worker.run(&job()).await.unwrap();

    assert!(report.created_entry);
    assert_eq!(report.new_chapters, 3);
    assert_eq!(report.pages_stored, 15);

    let entry = h
        .catalog
        .entry_by_slug("solo-leveling")
        .await
        .unwrap()
        .expect("entry should exist");
    assert_eq!(entry.title, "Solo Leveling");
    // Cover was re-hosted, so the record no longer points at the source CDN.
    assert!(entry.cover_image_url.starts_with("memory://"));

    let chapters = h.catalog.chapters_for(entry.id);
    assert_eq!(chapters.len(), 3);
    assert_eq!(chapters[0].number, 1);
    assert_eq!(chapters[0].slug, "solo-leveling-chapter-1");
    assert_eq!(chapters[2].slug, "solo-leveling-chapter-3");

    let pages = h.catalog.pages_for(chapters[0].id);
    assert_eq!(pages.len(), 5);
    assert_eq!(pages[0].page_number, 1);

    // 15 page images plus the cover.
    assert_eq!(h.objects.object_count(), 16);
    assert_eq!(h.browser.open_sessions(), 0);
    assert_eq!(h.browser.open_pages(), 0);
}

#[tokio::test]
async fn rescan_ingests_only_unknown_chapters() {
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["c", "b", "a"]))
        .with_images(chapter_url("a"), vec!["https://cdn.example.com/a/1.jpg"])
        .with_images(chapter_url("b"), vec!["https://cdn.example.com/b/1.jpg"])
        .with_images(chapter_url("c"), vec!["https://cdn.example.com/c/1.jpg"]);

    let h = harness(browser.clone(), MockImageFetcher::new());
    h.worker.run(&job()).await.unwrap();

    // The source later lists e, d, c, b, a.
    let _ = browser
        .clone()
        .with_scrape(CATALOG_URL, scrape_payload(&["e", "d", "c", "b", "a"]))
        .with_images(chapter_url("d"), vec!["https://cdn.example.com/d/1.jpg"])
        .with_images(chapter_url("e"), vec!["https://cdn.example.com/e/1.jpg"]);

    let report = h.worker.run(&job()).await.unwrap();
    assert!(!report.created_entry);
    assert_eq!(report.new_chapters, 2);

    let entry = h.catalog.entry_by_slug("solo-leveling").await.unwrap().unwrap();
    let chapters = h.catalog.chapters_for(entry.id);
    assert_eq!(chapters.len(), 5);
    // d and e continue the numbering after the three known chapters.
    assert_eq!(chapters[3].slug, "solo-leveling-d");
    assert_eq!(chapters[3].number, 4);
    assert_eq!(chapters[4].slug, "solo-leveling-e");
    assert_eq!(chapters[4].number, 5);
}

#[tokio::test]
async fn unknown_source_type_fails_without_browser_work() {
    let h = harness(MockBrowser::new(), MockImageFetcher::new());
    let mut spec = job();
    spec.source_type = "mangadex".to_string();

    let err = h.worker.run(&spec).await.unwrap_err();
    assert!(matches!(err, IngestError::UnknownSourceType { .. }));
    assert_eq!(h.browser.sessions_opened(), 0);
}

#[tokio::test]
async fn invalid_spec_fails_without_browser_work() {
    let h = harness(MockBrowser::new(), MockImageFetcher::new());
    let mut spec = job();
    spec.source_url = "not a url".to_string();

    let err = h.worker.run(&spec).await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidJobSpec { .. }));
    assert_eq!(h.browser.sessions_opened(), 0);
}

#[tokio::test]
async fn session_is_closed_when_the_scrape_fails() {
    // Navigation to the catalog page fails every time.
    let browser = MockBrowser::new().with_navigate_failures(CATALOG_URL, 10);
    let h = harness(browser, MockImageFetcher::new());

    let err = h.worker.run(&job()).await.unwrap_err();
    assert!(matches!(err, IngestError::Browser(_)));
    assert_eq!(h.browser.sessions_opened(), 1);
    assert_eq!(h.browser.open_sessions(), 0);
    assert_eq!(h.browser.open_pages(), 0);
}

#[tokio::test]
async fn image_retrieval_retries_then_succeeds() {
    let reader = chapter_url("Chapter 1");
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["Chapter 1"]))
        .with_images(reader.clone(), vec!["https://cdn.example.com/c1/1.jpg"])
        // Two failing waits, then the third attempt sees decoded images.
        .with_wait_failures(reader.clone(), 2);

    let h = harness(browser, MockImageFetcher::new());
    let report = h.worker.run(&job()).await.unwrap();

    assert_eq!(report.pages_stored, 1);
    let reader_navigations = h
        .browser
        .navigations()
        .into_iter()
        .filter(|u| u == &reader)
        .count();
    assert_eq!(reader_navigations, 3);
}

#[tokio::test]
async fn image_retrieval_exhausts_after_bounded_attempts() {
    let reader = chapter_url("Chapter 1");
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["Chapter 1"]))
        .with_images(reader.clone(), vec!["https://cdn.example.com/c1/1.jpg"])
        .with_wait_failures(reader.clone(), 99);

    let h = harness(browser, MockImageFetcher::new());
    let err = h.worker.run(&job()).await.unwrap_err();

    match err {
        IngestError::ImageRetrievalExhausted { attempts, url } => {
            assert_eq!(attempts, 3);
            assert_eq!(url, reader);
        }
        other => panic!("expected ImageRetrievalExhausted, got {:?}", other),
    }

    let reader_navigations = h
        .browser
        .navigations()
        .into_iter()
        .filter(|u| u == &reader)
        .count();
    assert_eq!(reader_navigations, 3);
    assert_eq!(h.browser.open_sessions(), 0);
}

#[tokio::test]
async fn failed_page_uploads_are_skipped_not_fatal() {
    let reader = chapter_url("Chapter 1");
    let urls = image_urls("c1", 4);
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["Chapter 1"]))
        .with_images(reader, urls.iter().map(|s| s.as_str()).collect());

    // Second image can never be fetched.
    let fetcher = MockImageFetcher::new().with_failure(urls[1].clone());
    let h = harness(browser, fetcher);

    let report = h.worker.run(&job()).await.unwrap();
    assert_eq!(report.pages_stored, 3);

    let entry = h.catalog.entry_by_slug("solo-leveling").await.unwrap().unwrap();
    let chapters = h.catalog.chapters_for(entry.id);
    let pages = h.catalog.pages_for(chapters[0].id);

    // Page 2 is missing, but the others keep their source-order numbers.
    let numbers: Vec<i32> = pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 3, 4]);
}

#[tokio::test]
async fn page_numbers_follow_source_order_not_completion_order() {
    let reader = chapter_url("Chapter 1");
    let urls = image_urls("c1", 3);
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["Chapter 1"]))
        .with_images(reader, urls.iter().map(|s| s.as_str()).collect());

    // The first image finishes last.
    let fetcher = MockImageFetcher::new()
        .with_delay(urls[0].clone(), Duration::from_millis(50))
        .with_delay(urls[1].clone(), Duration::from_millis(20));
    let h = harness(browser, fetcher);

    let report = h.worker.run(&job()).await.unwrap();
    assert_eq!(report.pages_stored, 3);

    let entry = h.catalog.entry_by_slug("solo-leveling").await.unwrap().unwrap();
    let chapters = h.catalog.chapters_for(entry.id);
    let pages = h.catalog.pages_for(chapters[0].id);

    for (index, page) in pages.iter().enumerate() {
        assert_eq!(page.page_number, (index + 1) as i32);
        // image_url is the stored copy keyed by the source-order page.
        assert!(page.image_url.starts_with("memory://"));
    }
    assert_eq!(h.fetcher.fetched().len(), 3);
}

#[tokio::test]
async fn cover_upload_failure_keeps_the_source_url() {
    let reader = chapter_url("Chapter 1");
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["Chapter 1"]))
        .with_images(reader, vec!["https://cdn.example.com/c1/1.jpg"]);

    let fetcher = MockImageFetcher::new().with_failure("https://cdn.example.com/solo-cover.jpg");
    let h = harness(browser, fetcher);

    let report = h.worker.run(&job()).await.unwrap();
    assert!(report.created_entry);
    assert_eq!(report.pages_stored, 1);

    let entry = h.catalog.entry_by_slug("solo-leveling").await.unwrap().unwrap();
    assert_eq!(entry.cover_image_url, "https://cdn.example.com/solo-cover.jpg");
}

#[tokio::test]
async fn scroll_loop_stops_when_position_repeats() {
    let reader = chapter_url("Chapter 1");
    let browser = MockBrowser::new()
        .with_scrape(CATALOG_URL, scrape_payload(&["Chapter 1"]))
        .with_images(reader.clone(), vec!["https://cdn.example.com/c1/1.jpg"])
        // Page keeps growing for a few reads, then settles.
        .with_scroll_positions(reader, vec![800, 1600, 2400, 2400]);

    let h = harness(browser, MockImageFetcher::new());
    let report = h.worker.run(&job()).await.unwrap();
    assert_eq!(report.pages_stored, 1);
}
