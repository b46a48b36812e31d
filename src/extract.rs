//! Air-date and episode extraction from free-text catalog metadata.
//!
//! Catalog entries carry a one-line info blurb such as
//! `"12话 / 2021年4月3日 / 监督 ..."`. The air date is written in several
//! styles depending on who edited the entry, so extraction walks an ordered
//! list of patterns and stops at the first hit:
//!
//! | # | Pattern | Example |
//! |---|---------|---------|
//! | 1 | full localized date | `2021年4月3日` |
//! | 2 | ISO-like date | `2021-04-03(日本)` |
//! | 3 | localized year-month | `2021年4月` |
//! | 4 | ISO-like year-month | `2021-04` |
//! | 5 | localized year | `2021年` |
//! | 6 | bare 4-digit number | `2021` |
//!
//! Full-width digits (`２０２１年`) are folded to ASCII before matching; digits
//! from other scripts never match.
//!
//! Nothing here fails: unparseable text just keeps the caller's defaults.

use crate::models::{AirDate, Episodes};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// One entry of the fallback chain.
struct DatePattern {
    name: &'static str,
    regex: Regex,
    extract: fn(&Captures<'_>) -> AirDate,
}

impl DatePattern {
    fn new(name: &'static str, pattern: &str, extract: fn(&Captures<'_>) -> AirDate) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("Invalid regex pattern defined in code"),
            extract,
        }
    }
}

fn group<T: std::str::FromStr + Default>(caps: &Captures<'_>, i: usize) -> T {
    caps.get(i)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_default()
}

fn year_month_day(caps: &Captures<'_>) -> AirDate {
    AirDate::new(group(caps, 1), group(caps, 2), group(caps, 3))
}

fn year_month(caps: &Captures<'_>) -> AirDate {
    AirDate::new(group(caps, 1), group(caps, 2), 0)
}

fn year_only(caps: &Captures<'_>) -> AirDate {
    AirDate::new(group(caps, 1), 0, 0)
}

/// Evaluated in order; the first matching pattern wins.
static DATE_PATTERNS: Lazy<Vec<DatePattern>> = Lazy::new(|| {
    vec![
        DatePattern::new(
            "localized_date",
            r"([0-9]{4})年([0-9]{1,2})月([0-9]{1,2})日",
            year_month_day,
        ),
        DatePattern::new(
            "iso_date",
            r"([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})(?:\(.*?\))?",
            year_month_day,
        ),
        DatePattern::new(
            "localized_year_month",
            r"([0-9]{4})年([0-9]{1,2})月",
            year_month,
        ),
        DatePattern::new(
            "iso_year_month",
            r"([0-9]{4})-([0-9]{1,2})(?:\(.*?\))?",
            year_month,
        ),
        DatePattern::new("localized_year", r"([0-9]{4})年", year_only),
        DatePattern::new("bare_year", r"\b([0-9]{4})\b", year_only),
    ]
});

static EPISODES_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)话").expect("Invalid regex pattern defined in code"));

/// Structured view of an info blurb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub air_date: AirDate,
    pub episodes: Episodes,
}

/// Fold full-width digits `０`-`９` to ASCII; other text is left alone.
fn fold_digits(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| ('０'..='９').contains(&c)) {
        return Cow::Borrowed(text);
    }
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect::<String>()
        .into()
}

/// Run the fallback chain and report which pattern matched.
fn match_date(text: &str) -> Option<(&'static str, AirDate)> {
    let text = fold_digits(text);
    DATE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .regex
            .captures(&text)
            .map(|caps| (pattern.name, (pattern.extract)(&caps)))
    })
}

/// Extract the air date from `text`.
///
/// When no pattern matches, the date falls back to `base_year` and
/// `base_month` (or 0) with an unknown day. A matched pattern always
/// overrides the base values, including zeroing fields it does not carry.
pub fn extract_air_date(text: &str, base_year: i32, base_month: Option<u32>) -> AirDate {
    match match_date(text) {
        Some((_, date)) => date,
        None => AirDate::new(base_year, base_month.unwrap_or(0), 0),
    }
}

pub fn extract_episodes(text: &str) -> Episodes {
    EPISODES_PATTERN
        .captures(&fold_digits(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .map(Episodes::Count)
        .unwrap_or(Episodes::Unknown)
}

pub fn extract_metadata(text: &str, base_year: i32, base_month: Option<u32>) -> Metadata {
    let text = text.trim();
    Metadata {
        air_date: extract_air_date(text, base_year, base_month),
        episodes: extract_episodes(text),
    }
}
