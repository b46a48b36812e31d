//! Data models for catalog entries and their identity across runs.
//!
//! - [`AnimeRecord`]: one catalog entry as scraped or as recovered from a report
//! - [`AirDate`]: broadcast date where `0` means "unknown" for month and day
//! - [`Episodes`]: episode count, possibly unknown
//! - [`DedupKey`]: the tuple that identifies an entry across runs

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Placeholder rendered for anything whose value is not known.
pub const UNKNOWN: &str = "未知";

/// Broadcast date of an entry.
///
/// Field order matters: the derived `Ord` compares year, then month, then day,
/// which is exactly the report's "most recent first" ordering when reversed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AirDate {
    pub year: i32,
    /// 1-12, or 0 when unknown.
    pub month: u32,
    /// 1-31, or 0 when unknown.
    pub day: u32,
}

impl AirDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl fmt::Display for AirDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.year == 0 {
            return f.write_str(UNKNOWN);
        }
        write!(f, "{}", self.year)?;
        if self.month > 0 {
            write!(f, "-{:02}", self.month)?;
            if self.day > 0 {
                write!(f, "-{:02}", self.day)?;
            }
        }
        Ok(())
    }
}

/// Episode count of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Episodes {
    Count(u32),
    #[default]
    Unknown,
}

impl fmt::Display for Episodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Episodes::Count(n) => write!(f, "{n}"),
            Episodes::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl From<Episodes> for String {
    fn from(value: Episodes) -> Self {
        value.to_string()
    }
}

impl FromStr for Episodes {
    type Err = std::convert::Infallible;

    /// Anything that is not a plain number is treated as unknown.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.trim()
            .parse::<u32>()
            .map(Episodes::Count)
            .unwrap_or(Episodes::Unknown))
    }
}

/// A single catalog entry.
///
/// Every field has a placeholder default so partially scraped entries and
/// sparse report rows can both be represented. Records are built once and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimeRecord {
    /// Primary (localized) title.
    pub title: String,
    /// Original-language title, empty when the catalog has none.
    pub alt_title: String,
    /// Absolute cover image URL, empty when absent.
    pub cover: String,
    /// Absolute detail-page URL, empty when absent.
    pub url: String,
    #[serde(flatten)]
    pub air_date: AirDate,
    pub episodes: Episodes,
    /// Score as displayed by the catalog, `-` when unrated.
    pub score: String,
    /// Vote count, digits only.
    pub votes: String,
}

impl Default for AnimeRecord {
    fn default() -> Self {
        Self {
            title: String::new(),
            alt_title: String::new(),
            cover: String::new(),
            url: String::new(),
            air_date: AirDate::default(),
            episodes: Episodes::Unknown,
            score: "-".to_string(),
            votes: "0".to_string(),
        }
    }
}

impl AnimeRecord {
    /// Last path segment of the detail URL, e.g. `"12345"` for
    /// `https://bangumi.tv/subject/12345`.
    pub fn url_slug(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }

    pub fn key(&self) -> DedupKey {
        DedupKey {
            year: self.air_date.year,
            title: self.title.clone(),
            episodes: self.episodes,
            slug: self.url_slug().to_string(),
        }
    }
}

/// Identity of an entry across runs: (year, title, episode count, URL slug).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub year: i32,
    pub title: String,
    pub episodes: Episodes,
    pub slug: String,
}

/// Strip everything but ASCII digits, falling back to `"0"`.
///
/// Vote counts arrive as `(1234人评分)` from the catalog and as bare numbers
/// from existing reports; both normalize to the same string.
pub fn digits_or_zero(s: &str) -> String {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits
    }
}
