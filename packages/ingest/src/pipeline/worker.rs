//! End-to-end execution of a single ingestion job.

use std::sync::Arc;

use crate::adapters::{AdapterRegistry, SourceAdapter};
use crate::browser::{Browser, BrowserPage, BrowserSession};
use crate::catalog::reconciler::Reconciler;
use crate::error::Result;
use crate::pipeline::images::{ChapterIngestor, IngestorConfig};
use crate::traits::fetch::ImageFetcher;
use crate::traits::objects::ObjectStore;
use crate::traits::store::CatalogStore;
use crate::types::{JobReport, JobSpec};

/// Runs one job end to end: validate, resolve adapter, scrape, reconcile,
/// ingest new chapters in order.
///
/// Chapters within a job run sequentially; only the page images inside a
/// chapter fan out. The browser session opened for the job is closed on
/// every exit path.
pub struct JobWorker {
    adapters: AdapterRegistry,
    browser: Arc<dyn Browser>,
    reconciler: Reconciler,
    ingestor: ChapterIngestor,
}

impl JobWorker {
    pub fn new(
        adapters: AdapterRegistry,
        browser: Arc<dyn Browser>,
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ImageFetcher>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            adapters,
            browser,
            reconciler: Reconciler::new(catalog.clone()),
            ingestor: ChapterIngestor::new(catalog, objects, fetcher, config),
        }
    }

    /// Execute the job and report what it produced.
    pub async fn run(&self, job: &JobSpec) -> Result<JobReport> {
        job.validate()?;
        let adapter = self.adapters.get(&job.source_type)?;

        tracing::info!(job_id = %job.id, url = %job.source_url, source = %job.source_type, "starting job");

        let session = self.browser.session().await?;
        let result = self.run_in_session(&*session, &*adapter, job).await;
        session.close().await;

        match &result {
            Ok(report) => tracing::info!(
                job_id = %job.id,
                created_entry = report.created_entry,
                new_chapters = report.new_chapters,
                pages_stored = report.pages_stored,
                "job finished"
            ),
            Err(error) => tracing::error!(job_id = %job.id, error = %error, "job failed"),
        }
        result
    }

    async fn run_in_session(
        &self,
        session: &dyn BrowserSession,
        adapter: &dyn SourceAdapter,
        job: &JobSpec,
    ) -> Result<JobReport> {
        let page = session.page().await?;
        let result = self.run_on_page(&*page, adapter, job).await;
        page.close().await;
        result
    }

    async fn run_on_page(
        &self,
        page: &dyn BrowserPage,
        adapter: &dyn SourceAdapter,
        job: &JobSpec,
    ) -> Result<JobReport> {
        let scrape = adapter.scrape(page, &job.source_url).await?;
        tracing::info!(
            title = %scrape.title,
            chapters = scrape.chapters.len(),
            "scraped catalog page"
        );

        let outcome = self.reconciler.reconcile(&scrape).await?;

        if outcome.created_entry {
            // Cover storage is best-effort; the entry keeps the source URL
            // when the upload fails.
            if let Err(error) = self.ingestor.store_cover(&outcome.entry).await {
                tracing::warn!(
                    entry = %outcome.entry.slug,
                    error = %error,
                    "cover upload failed, keeping source url"
                );
            }
        }

        let mut pages_stored = 0;
        for chapter in &outcome.new_chapters {
            pages_stored += self.ingestor.ingest(page, &outcome.entry, chapter).await?;
        }

        Ok(JobReport {
            job_id: job.id,
            entry_id: outcome.entry.id,
            created_entry: outcome.created_entry,
            new_chapters: outcome.new_chapters.len(),
            pages_stored,
        })
    }
}
