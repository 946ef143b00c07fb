//! Scriptable test doubles for the browser and image fetching seams.
//!
//! Useful for exercising the pipeline without a real browser or network.
//! Fixtures are keyed by URL: a canned scrape payload for catalog pages,
//! image URL lists for reader pages, and injectable failures with counts.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::browser::{Browser, BrowserPage, BrowserSession};
use crate::error::{IngestError, Result};
use crate::pipeline::images::COLLECT_IMAGE_URLS;
use crate::traits::fetch::{FetchedImage, ImageFetcher};

#[derive(Default, Clone)]
struct PageFixture {
    /// Payload returned for a catalog scrape script.
    scrape: Option<Value>,
    /// Reader image URLs, in DOM order.
    image_urls: Vec<String>,
    /// Scroll positions reported in sequence; the last value repeats.
    scroll_positions: Vec<i64>,
    /// Remaining navigations to this URL that should fail.
    navigate_failures: u32,
    /// Remaining image-decode waits on this URL that should fail.
    wait_failures: u32,
}

#[derive(Default)]
struct BrowserState {
    fixtures: HashMap<String, PageFixture>,
    navigations: Vec<String>,
    sessions_opened: usize,
    sessions_closed: usize,
    pages_opened: usize,
    pages_closed: usize,
}

/// A scriptable [`Browser`] whose pages answer from canned fixtures.
#[derive(Default, Clone)]
pub struct MockBrowser {
    state: Arc<RwLock<BrowserState>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scrape payload a catalog page returns.
    pub fn with_scrape(self, url: impl Into<String>, payload: Value) -> Self {
        self.fixture(url.into(), |f| f.scrape = Some(payload));
        self
    }

    /// Set the image URLs a reader page yields.
    pub fn with_images(self, url: impl Into<String>, urls: Vec<&str>) -> Self {
        let urls = urls.into_iter().map(String::from).collect();
        self.fixture(url.into(), |f| f.image_urls = urls);
        self
    }

    /// Script the scroll positions a page reports. Defaults to an immediate
    /// stop (position never moves).
    pub fn with_scroll_positions(self, url: impl Into<String>, positions: Vec<i64>) -> Self {
        self.fixture(url.into(), |f| f.scroll_positions = positions);
        self
    }

    /// Make the next `count` navigations to this URL fail.
    pub fn with_navigate_failures(self, url: impl Into<String>, count: u32) -> Self {
        self.fixture(url.into(), |f| f.navigate_failures = count);
        self
    }

    /// Make the next `count` image-decode waits on this URL fail.
    pub fn with_wait_failures(self, url: impl Into<String>, count: u32) -> Self {
        self.fixture(url.into(), |f| f.wait_failures = count);
        self
    }

    /// Every navigation performed, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state.read().unwrap().navigations.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.read().unwrap().sessions_opened
    }

    /// Sessions opened but never closed. Zero after a well-behaved job.
    pub fn open_sessions(&self) -> usize {
        let state = self.state.read().unwrap();
        state.sessions_opened - state.sessions_closed
    }

    pub fn open_pages(&self) -> usize {
        let state = self.state.read().unwrap();
        state.pages_opened - state.pages_closed
    }

    fn fixture(&self, url: String, configure: impl FnOnce(&mut PageFixture)) {
        let mut state = self.state.write().unwrap();
        configure(state.fixtures.entry(url).or_default());
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn session(&self) -> Result<Box<dyn BrowserSession>> {
        self.state.write().unwrap().sessions_opened += 1;
        Ok(Box::new(MockSession {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockSession {
    state: Arc<RwLock<BrowserState>>,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn page(&self) -> Result<Box<dyn BrowserPage>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::Browser("session already closed".to_string()));
        }
        self.state.write().unwrap().pages_opened += 1;
        Ok(Box::new(MockPage {
            state: self.state.clone(),
            cursor: Mutex::new(PageCursor::default()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.write().unwrap().sessions_closed += 1;
        }
    }
}

#[derive(Default)]
struct PageCursor {
    url: Option<String>,
    scroll_reads: usize,
}

struct MockPage {
    state: Arc<RwLock<BrowserState>>,
    cursor: Mutex<PageCursor>,
    closed: AtomicBool,
}

impl MockPage {
    fn current_fixture(&self) -> Result<(String, PageFixture)> {
        let cursor = self.cursor.lock().unwrap();
        let url = cursor
            .url
            .clone()
            .ok_or_else(|| IngestError::Browser("no page loaded".to_string()))?;
        let fixture = self
            .state
            .read()
            .unwrap()
            .fixtures
            .get(&url)
            .cloned()
            .unwrap_or_default();
        Ok((url, fixture))
    }
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.navigations.push(url.to_string());
        if let Some(fixture) = state.fixtures.get_mut(url) {
            if fixture.navigate_failures > 0 {
                fixture.navigate_failures -= 1;
                return Err(IngestError::Browser(format!(
                    "scripted navigation failure for {}",
                    url
                )));
            }
        }
        drop(state);

        let mut cursor = self.cursor.lock().unwrap();
        cursor.url = Some(url.to_string());
        cursor.scroll_reads = 0;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let (url, fixture) = self.current_fixture()?;

        if script == COLLECT_IMAGE_URLS {
            return Ok(Value::from(fixture.image_urls));
        }

        if script.contains("scrollBy") {
            let positions = if fixture.scroll_positions.is_empty() {
                vec![0]
            } else {
                fixture.scroll_positions
            };
            let mut cursor = self.cursor.lock().unwrap();
            let index = cursor.scroll_reads.min(positions.len() - 1);
            cursor.scroll_reads += 1;
            return Ok(Value::from(positions[index]));
        }

        fixture
            .scrape
            .clone()
            .ok_or_else(|| IngestError::Browser(format!("no scripted result for {}", url)))
    }

    async fn wait_for(&self, _predicate: &str, _timeout: Duration) -> Result<()> {
        let (url, _) = self.current_fixture()?;
        let mut state = self.state.write().unwrap();
        if let Some(fixture) = state.fixtures.get_mut(&url) {
            if fixture.wait_failures > 0 {
                fixture.wait_failures -= 1;
                return Err(IngestError::Browser(format!(
                    "scripted wait failure for {}",
                    url
                )));
            }
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.write().unwrap().pages_closed += 1;
        }
    }
}

/// An [`ImageFetcher`] that synthesizes bytes from the URL.
#[derive(Default)]
pub struct MockImageFetcher {
    failures: RwLock<HashSet<String>>,
    delays: RwLock<HashMap<String, Duration>>,
    content_types: RwLock<HashMap<String, String>>,
    fetched: RwLock<Vec<String>>,
}

impl MockImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fetches of this URL fail.
    pub fn with_failure(self, url: impl Into<String>) -> Self {
        self.failures.write().unwrap().insert(url.into());
        self
    }

    /// Delay fetches of this URL, to shuffle completion order in tests.
    pub fn with_delay(self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.write().unwrap().insert(url.into(), delay);
        self
    }

    /// Override the content type reported for this URL.
    pub fn with_content_type(self, url: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.content_types
            .write()
            .unwrap()
            .insert(url.into(), content_type.into());
        self
    }

    /// Every URL fetched, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.read().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        self.fetched.write().unwrap().push(url.to_string());

        let delay = self.delays.read().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failures.read().unwrap().contains(url) {
            return Err(IngestError::Upload {
                url: url.to_string(),
                reason: "scripted fetch failure".to_string(),
            });
        }

        let content_type = self
            .content_types
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| "image/jpeg".to_string());

        Ok(FetchedImage {
            bytes: url.as_bytes().to_vec(),
            content_type,
        })
    }
}
