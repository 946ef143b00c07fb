//! Adapter for Makima-style catalog pages.

use async_trait::async_trait;

use super::{into_scrape_result, RawScrape, SourceAdapter};
use crate::browser::BrowserPage;
use crate::error::Result;
use crate::types::ScrapeResult;

// Same chapter-list markup as ReaperTrans, different info layout. The
// description lives in paragraph tags that need joining.
const SCRAPE_SCRIPT: &str = r#"
(() => {
  const text = (selector) =>
    (document.querySelector(selector)?.textContent || '').trim();
  const texts = (selector) =>
    Array.from(document.querySelectorAll(selector))
      .map((el) => (el.textContent || '').trim())
      .filter((t) => t.length > 0);

  const info = 'div.main-info > div.info-left > div > div.tsinfo.bixbox';

  const descriptionRoot = document.querySelector(
    'div.entry-content.entry-content-single[itemprop="description"]',
  );
  const description = descriptionRoot
    ? Array.from(descriptionRoot.querySelectorAll('p'))
        .map((p) => (p.textContent || '').trim())
        .filter((t) => t.length > 0)
        .join(' ')
    : '';

  const chapters = Array.from(
    document.querySelectorAll('#chapterlist > ul > li > div > div > a'),
  ).map((a) => ({
    title: a.querySelector('span.chapternum')?.textContent?.trim() || null,
    url: a.getAttribute('href') || '',
  }));

  return {
    title: text('#titlemove > h1'),
    alternative_title: text('#titlemove > span'),
    cover_image_url:
      document
        .querySelector('div.main-info > div.info-left > div > div.thumb > img')
        ?.getAttribute('src') || '',
    description,
    serialization: text(info + ' > div:nth-child(6) > i'),
    authors: texts(info + ' > div:nth-child(4) > i'),
    artists: texts(info + ' > div:nth-child(5) > i'),
    kinds: texts(info + ' > div:nth-child(2) > a'),
    statuses: texts(info + ' > div:nth-child(1) > i'),
    genres: texts('span.mgen > a'),
    chapters,
  };
})()
"#;

pub struct MakimaAdapter;

#[async_trait]
impl SourceAdapter for MakimaAdapter {
    fn source_type(&self) -> &'static str {
        "makima"
    }

    async fn scrape(&self, page: &dyn BrowserPage, url: &str) -> Result<ScrapeResult> {
        page.navigate(url).await?;
        let value = page.evaluate(SCRAPE_SCRIPT).await?;
        let raw: RawScrape = serde_json::from_value(value)?;
        into_scrape_result(raw, url)
    }
}
