//! Adapter for ReaperTrans-style catalog pages.

use async_trait::async_trait;

use super::{into_scrape_result, RawScrape, SourceAdapter};
use crate::browser::BrowserPage;
use crate::error::Result;
use crate::types::ScrapeResult;

/// Collects title, metadata, and the chapter list (newest first) from a
/// series page. Returns plain strings; normalization happens host-side.
const SCRAPE_SCRIPT: &str = r#"
(() => {
  const text = (selector) =>
    (document.querySelector(selector)?.textContent || '').trim();
  const texts = (selector) =>
    Array.from(document.querySelectorAll(selector))
      .map((el) => (el.textContent || '').trim())
      .filter((t) => t.length > 0);

  const chapters = Array.from(
    document.querySelectorAll('#chapterlist > ul > li > div > div > a'),
  ).map((a) => ({
    title: a.querySelector('span.chapternum')?.textContent?.trim() || null,
    url: a.getAttribute('href') || '',
  }));

  return {
    title: text('div.bixbox.animefull > div.bigcontent > div.infox > h1'),
    alternative_title: text('div.bigcontent > div.infox > div:nth-child(2) > span'),
    cover_image_url:
      document
        .querySelector('div.bigcontent > div.thumbook > div.thumb > img')
        ?.getAttribute('src') || '',
    description: text('div.bigcontent > div.infox > div:nth-child(3) > div > p'),
    serialization: text(
      'div.bigcontent > div.infox > div:nth-child(6) > div:nth-child(1) > span',
    ),
    authors: texts(
      'div.bigcontent > div.infox > div:nth-child(4) > div:nth-child(2) > span',
    ),
    artists: texts('div.bigcontent > div.infox > div:nth-child(5) > div > span'),
    kinds: texts(
      'div.bigcontent > div.thumbook > div.rt > div.tsinfo > div:nth-child(2) > a',
    ),
    statuses: texts(
      'div.bigcontent > div.thumbook > div.rt > div.tsinfo > div:nth-child(1) > i',
    ),
    genres: texts(
      'div.bigcontent > div.infox > div:nth-child(8) > span > a:nth-child(1)',
    ),
    chapters,
  };
})()
"#;

pub struct ReaperTransAdapter;

#[async_trait]
impl SourceAdapter for ReaperTransAdapter {
    fn source_type(&self) -> &'static str {
        "reapertrans"
    }

    async fn scrape(&self, page: &dyn BrowserPage, url: &str) -> Result<ScrapeResult> {
        page.navigate(url).await?;
        let value = page.evaluate(SCRAPE_SCRIPT).await?;
        let raw: RawScrape = serde_json::from_value(value)?;
        into_scrape_result(raw, url)
    }
}
