//! Browser abstraction the pipeline runs against.
//!
//! The trait surface is intentionally small (`navigate`, `evaluate`,
//! `wait_for`, `close`) so pipeline logic can be exercised with the
//! scriptable doubles in [`testing`](crate::testing) while production uses
//! the CDP-backed implementation in [`chromium`].

pub mod chromium;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{IngestError, Result};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches browser sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh session. Sessions are scoped to one job and must be
    /// closed by the caller when the job finishes, success or not.
    async fn session(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One live browser instance, owning its pages.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open a new page in this session.
    async fn page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Release the session. Safe to call more than once.
    async fn close(&self);
}

/// A single page (tab) the pipeline drives.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the page to settle.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Poll a boolean expression in the page until it is truthy.
    async fn wait_for(&self, predicate: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let value = self.evaluate(predicate).await?;
            if value.as_bool() == Some(true) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(IngestError::Browser(format!(
                    "timed out after {:?} waiting for page condition",
                    timeout
                )));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Close the page. Safe to call more than once.
    async fn close(&self);
}
