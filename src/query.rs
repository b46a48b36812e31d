//! Operator input and target planning.
//!
//! A [`ScrapeQuery`] is what the operator asked for (`2010-2023`, or `2021`
//! with months `4-7`). [`plan_targets`] turns it into the list of catalogs
//! actually worth fetching, dropping anything that has not aired yet.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Inclusive year range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

/// Inclusive month range within one year, both ends in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: u32,
    pub end: u32,
}

/// Split `"a-b"` into its two halves, or return `(s, s)` for a single value.
fn split_range(s: &str) -> Option<(&str, &str)> {
    match s.split_once('-') {
        Some((a, b)) if !b.contains('-') => Some((a.trim(), b.trim())),
        Some(_) => None,
        None => Some((s, s)),
    }
}

fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for YearRange {
    type Err = Error;

    /// Accepts `YYYY` or `YYYY-YYYY`; a reversed range is normalized.
    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let invalid = |reason: &'static str| Error::InvalidYear {
            input: input.to_string(),
            reason,
        };
        if input.is_empty() {
            return Err(invalid("a year is required"));
        }
        let (a, b) = split_range(input).ok_or_else(|| invalid("expected YYYY or YYYY-YYYY"))?;
        let a: i32 = parse_digits(a).ok_or_else(|| invalid("years must be numeric"))?;
        let b: i32 = parse_digits(b).ok_or_else(|| invalid("years must be numeric"))?;
        Ok(Self {
            start: a.min(b),
            end: a.max(b),
        })
    }
}

impl FromStr for MonthRange {
    type Err = Error;

    /// Accepts `M` or `M-M` with months in `1..=12`; a reversed range is normalized.
    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let invalid = |reason: &'static str| Error::InvalidMonth {
            input: input.to_string(),
            reason,
        };
        let (a, b) = split_range(input).ok_or_else(|| invalid("expected M or M-M"))?;
        let a: u32 = parse_digits(a).ok_or_else(|| invalid("months must be numeric"))?;
        let b: u32 = parse_digits(b).ok_or_else(|| invalid("months must be numeric"))?;
        if !(1..=12).contains(&a) || !(1..=12).contains(&b) {
            return Err(invalid("months must be between 1 and 12"));
        }
        Ok(Self {
            start: a.min(b),
            end: a.max(b),
        })
    }
}

/// Parse an optional month answer; blank means "whole year".
pub fn parse_optional_months(s: &str) -> Result<Option<MonthRange>> {
    if s.trim().is_empty() {
        Ok(None)
    } else {
        s.parse().map(Some)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeQuery {
    pub years: YearRange,
    pub months: Option<MonthRange>,
}

/// One catalog to scrape: a whole year, or a single month of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub year: i32,
    pub month: Option<u32>,
}

impl Target {
    /// True when the target starts after `today`.
    pub fn is_future(&self, today: NaiveDate) -> bool {
        self.year > today.year()
            || (self.year == today.year() && self.month.is_some_and(|m| m > today.month()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{}-{:02}", self.year, month),
            None => write!(f, "{}", self.year),
        }
    }
}

/// Expand a query into catalog targets, oldest first.
///
/// A multi-year query always scrapes whole years and ignores any month
/// filter. A single year scrapes either the requested months or the whole
/// year. Targets later than `today` are skipped.
///
/// # Arguments
///
/// * `query` - Validated operator input
/// * `today` - Reference date for the future check, normally the local date
///
/// # Returns
///
/// Targets in chronological order; empty when everything lies in the future.
pub fn plan_targets(query: &ScrapeQuery, today: NaiveDate) -> Vec<Target> {
    let YearRange { start, end } = query.years;
    let multi_year = start != end;
    if multi_year && query.months.is_some() {
        warn!(start, end, "Month filter ignored for a multi-year query");
    }

    let mut targets = Vec::new();
    for year in start..=end {
        let months: Vec<Option<u32>> = match query.months {
            Some(MonthRange { start, end }) if !multi_year => (start..=end).map(Some).collect(),
            _ => vec![None],
        };
        for month in months {
            let target = Target { year, month };
            if target.is_future(today) {
                info!(%target, "Skipping target that has not aired yet");
                continue;
            }
            targets.push(target);
        }
    }
    targets
}
