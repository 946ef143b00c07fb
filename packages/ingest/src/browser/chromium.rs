//! CDP-backed browser implementation using chromiumoxide.
//!
//! chromiumoxide pages have no Drop cleanup; CDP targets must be closed with
//! an explicit async call. Pages and sessions here keep their handles in an
//! `Option` behind a lock so `close()` stays idempotent.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{Browser, BrowserPage, BrowserSession};
use crate::error::{IngestError, Result};

/// Launch settings for Chromium sessions.
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    pub headless: bool,
    /// Upper bound on navigation including the post-load settle.
    pub navigation_timeout: Duration,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            window_width: 1280,
            window_height: 1024,
        }
    }
}

/// Launches one Chromium process per session.
pub struct ChromiumBrowser {
    config: ChromiumConfig,
}

impl ChromiumBrowser {
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn session(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.window_width, self.config.window_height);
        if !self.config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(IngestError::Browser)?;

        let (browser, mut handler) = CdpBrowser::launch(browser_config)
            .await
            .map_err(|e| IngestError::Browser(format!("failed to launch browser: {}", e)))?;

        // The handler must be polled for the whole session lifetime or CDP
        // messages stop flowing.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser: tokio::sync::Mutex::new(Some(browser)),
            handler_task: std::sync::Mutex::new(Some(handler_task)),
            navigation_timeout: self.config.navigation_timeout,
        }))
    }
}

struct ChromiumSession {
    browser: tokio::sync::Mutex<Option<CdpBrowser>>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    navigation_timeout: Duration,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn page(&self) -> Result<Box<dyn BrowserPage>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| IngestError::Browser("session already closed".to_string()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| IngestError::Browser(format!("failed to open page: {}", e)))?;
        Ok(Box::new(ChromiumPage {
            page: std::sync::Mutex::new(Some(page)),
            navigation_timeout: self.navigation_timeout,
        }))
    }

    async fn close(&self) {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                tracing::warn!("failed to close browser session: {}", e);
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("browser process wait failed: {}", e);
            }
        }
        let task = self
            .handler_task
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(task) = task {
            task.abort();
        }
    }
}

struct ChromiumPage {
    page: std::sync::Mutex<Option<Page>>,
    navigation_timeout: Duration,
}

impl ChromiumPage {
    fn handle(&self) -> Result<Page> {
        self.page
            .lock()
            .map_err(|_| IngestError::Browser("page lock poisoned".to_string()))?
            .as_ref()
            .cloned()
            .ok_or_else(|| IngestError::Browser("page already closed".to_string()))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.handle()?;
        let navigation = async {
            page.goto(url)
                .await
                .map_err(|e| IngestError::Browser(format!("navigation to {} failed: {}", url, e)))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| IngestError::Browser(format!("{} never settled: {}", url, e)))?;
            Ok(())
        };
        tokio::time::timeout(self.navigation_timeout, navigation)
            .await
            .map_err(|_| IngestError::Browser(format!("navigation to {} timed out", url)))?
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.handle()?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| IngestError::Browser(format!("script evaluation failed: {}", e)))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| IngestError::Browser(format!("script returned unusable value: {}", e)))
    }

    async fn close(&self) {
        let page = self
            .page
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(page) = page {
            if let Err(e) = page.close().await {
                tracing::debug!("failed to close page: {}", e);
            }
        }
    }
}
