//! Bangumi air-time catalog scraper.
//!
//! Listings live under `/anime/browser/airtime/{YYYY}[-{MM}]?sort=date` and
//! are paginated with `&page=N`. Every page holds up to 24 entries in
//! `#browserItemList`, and the pagination widget (`.page_inner`) links to the
//! other pages. A catalog with a single page has no widget at all.

use crate::client::PageSource;
use crate::extract::extract_metadata;
use crate::models::{AnimeRecord, digits_or_zero};
use crate::query::Target;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector defined in code")
}

static PAGINATION: Lazy<Selector> = Lazy::new(|| selector(".page_inner"));
static PAGE_LINK: Lazy<Selector> = Lazy::new(|| selector("a.p"));
static ITEM: Lazy<Selector> = Lazy::new(|| selector("#browserItemList > li.item"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("h3 > a.l"));
static ALT_TITLE: Lazy<Selector> = Lazy::new(|| selector("h3 small.grey"));
static COVER: Lazy<Selector> = Lazy::new(|| selector("a.subjectCover img.cover"));
static INFO: Lazy<Selector> = Lazy::new(|| selector("p.info.tip"));
static RATING: Lazy<Selector> = Lazy::new(|| selector("p.rateInfo"));
static SCORE: Lazy<Selector> = Lazy::new(|| selector("span.number"));
static VOTES: Lazy<Selector> = Lazy::new(|| selector("span.tip_j"));

/// Listing URL for a target, without the page parameter.
pub fn catalog_url(base_url: &Url, target: &Target) -> String {
    let origin = base_url.as_str().trim_end_matches('/');
    match target.month {
        Some(month) => format!(
            "{origin}/anime/browser/airtime/{}-{month:02}?sort=date",
            target.year
        ),
        None => format!("{origin}/anime/browser/airtime/{}?sort=date", target.year),
    }
}

pub fn page_url(catalog_url: &str, page: usize) -> String {
    format!("{catalog_url}&page={page}")
}

/// Element text with every run of whitespace collapsed to one space.
///
/// Report cells cannot hold line breaks, so records are built in the same
/// single-line form they are read back in.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().join(" ")
}

/// Highest page number linked from the pagination widget; 1 without a widget.
pub fn parse_page_count(html: &str) -> usize {
    let document = Html::parse_document(html);
    let Some(pagination) = document.select(&PAGINATION).next() else {
        return 1;
    };
    pagination
        .select(&PAGE_LINK)
        .filter_map(|link| text_of(link).parse::<usize>().ok())
        .fold(1, usize::max)
}

/// Absolute cover URL; protocol-relative sources are pinned to https.
fn resolve_cover(base_url: &Url, src: &str) -> String {
    if let Some(rest) = src.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        base_url
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string())
    }
}

fn parse_item(item: ElementRef<'_>, base_url: &Url, target: &Target) -> AnimeRecord {
    let mut record = AnimeRecord::default();

    if let Some(title) = item.select(&TITLE).next() {
        record.title = text_of(title);
        if let Some(href) = title.value().attr("href") {
            match base_url.join(href) {
                Ok(url) => record.url = url.to_string(),
                Err(e) => debug!(%href, error = %e, "Unresolvable detail link"),
            }
        }
    }

    if let Some(alt) = item.select(&ALT_TITLE).next() {
        record.alt_title = text_of(alt);
    }

    if let Some(img) = item.select(&COVER).next() {
        let src = img
            .value()
            .attr("src")
            .filter(|s| !s.is_empty())
            .or_else(|| img.value().attr("data-cfsrc"))
            .unwrap_or_default();
        if !src.is_empty() {
            record.cover = resolve_cover(base_url, src);
        }
    }

    let info = item.select(&INFO).next().map(text_of).unwrap_or_default();
    let meta = extract_metadata(&info, target.year, target.month);
    record.air_date = meta.air_date;
    record.episodes = meta.episodes;

    if let Some(rating) = item.select(&RATING).next() {
        if let Some(score) = rating.select(&SCORE).next() {
            let score = text_of(score);
            if !score.is_empty() {
                record.score = score;
            }
        }
        if let Some(votes) = rating.select(&VOTES).next() {
            record.votes = digits_or_zero(&text_of(votes));
        }
    }

    record
}

/// Extract every entry on one listing page.
///
/// Entries missing optional parts (cover, alt title, rating) keep their
/// placeholder values; nothing on the page is treated as fatal.
pub fn parse_page(html: &str, base_url: &Url, target: &Target) -> Vec<AnimeRecord> {
    let document = Html::parse_document(html);
    document
        .select(&ITEM)
        .map(|item| parse_item(item, base_url, target))
        .collect()
}

/// Total number of pages in a catalog, or 0 when the catalog is unreachable.
#[instrument(level = "info", skip(source))]
pub async fn fetch_page_count<S: PageSource>(source: &S, url: &str) -> usize {
    match source.fetch(url).await {
        Ok(html) => {
            let pages = parse_page_count(&html);
            info!(pages, "Resolved page count");
            pages
        }
        Err(e) => {
            error!(error = %e, "Could not resolve page count; skipping catalog");
            0
        }
    }
}

/// Fetch and parse one listing page while holding a concurrency permit.
///
/// A failed page yields no entries instead of failing the whole catalog.
#[instrument(level = "info", skip(source, semaphore, base_url, target), fields(%target))]
pub async fn scrape_page<S: PageSource>(
    source: &S,
    semaphore: &Semaphore,
    base_url: &Url,
    target: &Target,
    url: &str,
) -> Vec<AnimeRecord> {
    let html = {
        let Ok(_permit) = semaphore.acquire().await else {
            warn!("Semaphore closed; skipping page");
            return Vec::new();
        };
        info!("Scraping page");
        source.fetch(url).await
    };

    match html {
        Ok(html) => {
            let records = parse_page(&html, base_url, target);
            debug!(count = records.len(), "Parsed page");
            records
        }
        Err(e) => {
            warn!(error = %e, "Page scrape failed; continuing without it");
            Vec::new()
        }
    }
}
