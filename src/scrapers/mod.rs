//! Catalog scraping with bounded fan-out.
//!
//! Each target follows the same two-phase pattern:
//!
//! 1. **Indexing**: fetch the first listing page and read the page count
//! 2. **Fetching**: request every page at once, with a semaphore capping how
//!    many requests are in flight, and parse them as they arrive
//!
//! Targets themselves are scraped one after another. Failed pages and
//! unreachable catalogs are logged and contribute nothing; they never abort
//! the run.

pub mod bangumi;

use crate::client::PageSource;
use crate::error::Result;
use crate::models::AnimeRecord;
use crate::query::Target;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use url::Url;

/// Scraper over any [`PageSource`], with an explicit concurrency cap.
#[derive(Debug)]
pub struct Scraper<S> {
    source: S,
    base_url: Url,
    semaphore: Semaphore,
    concurrency: usize,
}

impl<S: PageSource> Scraper<S> {
    /// Create a scraper for the catalog at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `source` - Where pages come from, usually a retrying HTTP source
    /// * `base_url` - Catalog origin such as `https://bangumi.tv`
    /// * `concurrency` - Maximum simultaneous page requests; 0 is treated as 1
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`](crate::error::Error::Url) when `base_url` does not parse.
    pub fn new(source: S, base_url: &str, concurrency: usize) -> Result<Self> {
        let concurrency = concurrency.max(1);
        Ok(Self {
            source,
            base_url: Url::parse(base_url)?,
            semaphore: Semaphore::new(concurrency),
            concurrency,
        })
    }

    /// Scrape every page of one catalog.
    ///
    /// Records come back in page order, then in on-page order.
    #[instrument(level = "info", skip(self), fields(concurrency = self.concurrency))]
    pub async fn scrape_target(&self, target: Target) -> Vec<AnimeRecord> {
        let catalog = bangumi::catalog_url(&self.base_url, &target);
        let pages = bangumi::fetch_page_count(&self.source, &catalog).await;
        if pages == 0 {
            warn!(%target, "No pages available; skipping target");
            return Vec::new();
        }

        let urls: Vec<String> = (1..=pages)
            .map(|page| bangumi::page_url(&catalog, page))
            .collect();
        let tasks = urls.iter().map(|url| {
            bangumi::scrape_page(&self.source, &self.semaphore, &self.base_url, &target, url)
        });
        let records: Vec<AnimeRecord> = join_all(tasks).await.into_iter().flatten().collect();

        info!(%target, pages, count = records.len(), "Scraped target");
        records
    }

    /// Scrape targets sequentially and concatenate the results.
    #[instrument(level = "info", skip_all, fields(targets = targets.len()))]
    pub async fn scrape_all(&self, targets: &[Target]) -> Vec<AnimeRecord> {
        let mut all = Vec::new();
        for target in targets {
            all.extend(self.scrape_target(*target).await);
        }
        info!(count = all.len(), "Finished scraping all targets");
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::Canned;
    use crate::error::Error;
    use crate::query::{MonthRange, ScrapeQuery, YearRange, plan_targets};
    use super::bangumi::tests::{PAGE, paginated};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://bangumi.tv";

    fn listing(year: i32, month: u32) -> String {
        format!("{BASE}/anime/browser/airtime/{year}-{month:02}?sort=date")
    }

    #[tokio::test]
    async fn test_month_range_only_hits_requested_months() {
        let mut pages = Vec::new();
        for month in 1..=12 {
            pages.push((listing(2020, month), PAGE.to_string()));
            pages.push((format!("{}&page=1", listing(2020, month)), PAGE.to_string()));
        }
        let source = Canned {
            pages,
            ..Default::default()
        };
        let scraper = Scraper::new(source, BASE, 3).unwrap();

        let query = ScrapeQuery {
            years: YearRange { start: 2020, end: 2020 },
            months: Some(MonthRange { start: 4, end: 6 }),
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let records = scraper.scrape_all(&plan_targets(&query, today)).await;

        let requested = scraper.source.requested();
        assert_eq!(requested.len(), 6);
        for url in &requested {
            assert!(
                url.contains("/2020-04?") || url.contains("/2020-05?") || url.contains("/2020-06?"),
                "unexpected request {url}"
            );
        }
        assert_eq!(records.len(), 9);
    }

    #[tokio::test]
    async fn test_every_page_is_requested_in_order() {
        let catalog = listing(2021, 4);
        let mut pages = vec![(catalog.clone(), paginated(3))];
        for page in 1..=3 {
            pages.push((format!("{catalog}&page={page}"), PAGE.to_string()));
        }
        let scraper = Scraper::new(
            Canned {
                pages,
                ..Default::default()
            },
            BASE,
            2,
        )
        .unwrap();

        let records = scraper
            .scrape_target(Target { year: 2021, month: Some(4) })
            .await;
        assert_eq!(records.len(), 9);
        assert_eq!(
            scraper.source.requested(),
            vec![
                catalog.clone(),
                format!("{catalog}&page=1"),
                format!("{catalog}&page=2"),
                format!("{catalog}&page=3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_page_does_not_abort_target() {
        let catalog = listing(2021, 4);
        let pages = vec![
            (catalog.clone(), paginated(3)),
            (format!("{catalog}&page=1"), PAGE.to_string()),
            (format!("{catalog}&page=3"), PAGE.to_string()),
        ];
        let scraper = Scraper::new(
            Canned {
                pages,
                ..Default::default()
            },
            BASE,
            5,
        )
        .unwrap();
        let records = scraper
            .scrape_target(Target { year: 2021, month: Some(4) })
            .await;
        assert_eq!(records.len(), 6);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_yields_nothing() {
        let scraper = Scraper::new(Canned::default(), BASE, 5).unwrap();
        let records = scraper
            .scrape_target(Target { year: 2021, month: None })
            .await;
        assert!(records.is_empty());
        assert_eq!(scraper.source.requested().len(), 1);
    }

    /// Tracks the peak number of overlapping fetches.
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PageSource for Gauge {
        async fn fetch(&self, url: &str) -> crate::error::Result<String> {
            if !url.contains("&page=") {
                return Ok(paginated(8));
            }
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Err(Error::Status {
                status: 500,
                url: url.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let scraper = Scraper::new(
            Gauge {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
            BASE,
            3,
        )
        .unwrap();
        scraper
            .scrape_target(Target { year: 2021, month: None })
            .await;
        let peak = scraper.source.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak was {peak}");
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let scraper = Scraper::new(Canned::default(), BASE, 0).unwrap();
        assert_eq!(scraper.concurrency, 1);
        assert_eq!(scraper.semaphore.available_permits(), 1);
    }
}
