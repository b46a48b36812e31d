//! Report serialization: the Markdown file is both the human-readable output
//! and the only persisted state, so it has a fixed grammar that
//! [`render_report`] writes and [`parse_report`] reads back.
//!
//! ```text
//! # Bangumi番剧数据报告
//!
//! ## 目录
//! - [2021年](#2021年)
//!
//! ## 2021年
//!
//! | 放送日期 | 封面 | 中文标题 | 日文标题 | 话数 | 评分 | 评分人数 |
//! | --- | --- | --- | --- | --- | --- | --- |
//! | 2021-04-03 | ![](https://…/cover.jpg) | [Foo](https://bangumi.tv/subject/1) | フー | 12 | 7.5 | 1234 |
//! ```
//!
//! - One section per air year, newest first; unknown years go last under `## 未知`.
//! - Rows within a section are newest first by (year, month, day).
//! - The date cell is `YYYY`, `YYYY-MM` or `YYYY-MM-DD`; `未知` when the year is unknown.
//! - `|` inside a cell is written as `\|`; line breaks become spaces.
//! - A title without a detail URL is written bare with `[` escaped as `\[`.
//!
//! Parsing is lenient: rows that cannot be understood are skipped with a
//! warning, everything else in the file (title, table of contents, headers)
//! is ignored.

use crate::error::{Error, Result};
use crate::models::{AirDate, AnimeRecord, Episodes, UNKNOWN, digits_or_zero};
use crate::utils::truncate_for_log;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;
use tracing::{debug, warn};

pub const REPORT_TITLE: &str = "# Bangumi番剧数据报告";
const TOC_HEADING: &str = "## 目录";
const TABLE_HEADER: &str = "| 放送日期 | 封面 | 中文标题 | 日文标题 | 话数 | 评分 | 评分人数 |";
const TABLE_DIVIDER: &str = "| --- | --- | --- | --- | --- | --- | --- |";
const DATE_COLUMN: &str = "放送日期";

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(.*)\]\((.*)\)$").expect("Invalid regex pattern defined in code"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^!\[\]\((.*)\)$").expect("Invalid regex pattern defined in code"));
static YEAR_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^## (\d+)年$").expect("Invalid regex pattern defined in code"));

/// Sort newest first. The sort is stable, so equal dates keep their input order.
pub fn sort_records(records: &mut [AnimeRecord]) {
    records.sort_by(|a, b| b.air_date.cmp(&a.air_date));
}

fn section_label(year: i32) -> String {
    if year == 0 {
        UNKNOWN.to_string()
    } else {
        format!("{year}年")
    }
}

fn escape_cell(text: &str) -> String {
    text.replace(['\r', '\n'], " ").replace('|', "\\|")
}

fn render_row(out: &mut String, record: &AnimeRecord) {
    let cover = if record.cover.is_empty() {
        String::new()
    } else {
        format!("![]({})", escape_cell(&record.cover))
    };
    let title = if record.url.is_empty() {
        // A bare title must not read back as a link.
        escape_cell(&record.title).replace('[', "\\[")
    } else {
        format!(
            "[{}]({})",
            escape_cell(&record.title),
            escape_cell(&record.url)
        )
    };
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "| {} | {} | {} | {} | {} | {} | {} |",
        record.air_date,
        cover,
        title,
        escape_cell(&record.alt_title),
        record.episodes,
        escape_cell(&record.score),
        escape_cell(&record.votes),
    );
}

/// Render a complete report.
///
/// Records are grouped by year and sorted here; callers can pass them in any
/// order.
pub fn render_report(records: &[AnimeRecord]) -> String {
    let mut sorted = records.to_vec();
    sort_records(&mut sorted);
    let sections: Vec<(i32, Vec<&AnimeRecord>)> = sorted
        .iter()
        .chunk_by(|r| r.air_date.year)
        .into_iter()
        .map(|(year, rows)| (year, rows.collect()))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "{REPORT_TITLE}\n\n{TOC_HEADING}");
    for (year, _) in &sections {
        let label = section_label(*year);
        let _ = writeln!(out, "- [{label}](#{label})");
    }
    out.push('\n');

    for (year, rows) in &sections {
        let _ = writeln!(out, "## {}\n", section_label(*year));
        let _ = writeln!(out, "{TABLE_HEADER}\n{TABLE_DIVIDER}");
        for record in rows {
            render_row(&mut out, record);
        }
        out.push('\n');
    }
    out
}

/// Split a table row into unescaped cells. The outer pipes are dropped.
fn split_cells(line: &str) -> Vec<String> {
    let inner = line.trim().strip_prefix('|').unwrap_or(line);
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    // Anything after the closing pipe is not a cell.
    if !cell.trim().is_empty() {
        cells.push(cell.trim().to_string());
    }
    cells
}

fn leading_number<T: std::str::FromStr>(part: &str) -> Option<T> {
    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Parse a date cell into (year, month, day); missing parts are `None`/0.
fn parse_date_cell(cell: &str) -> (Option<i32>, u32, u32) {
    if cell == UNKNOWN {
        return (None, 0, 0);
    }
    let mut parts = cell.split('-');
    let year = parts.next().and_then(leading_number);
    let month = parts.next().and_then(leading_number).unwrap_or(0);
    // Days may carry a region suffix such as `25(美国)`.
    let day = parts.next().and_then(leading_number).unwrap_or(0);
    (year, month, day)
}

fn parse_row(cells: &[String], section_year: Option<i32>) -> Result<AnimeRecord> {
    if cells.len() < 6 {
        return Err(Error::MalformedRow("expected at least 6 cells"));
    }
    let (year, month, day) = parse_date_cell(&cells[0]);
    let year = year
        .or(section_year)
        .ok_or(Error::MalformedRow("no year in date cell or section"))?;

    let cover = IMAGE
        .captures(&cells[1])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let (title, url) = match LINK.captures(&cells[2]) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => (cells[2].replace("\\[", "["), String::new()),
    };

    let score = if cells[5].is_empty() {
        "-".to_string()
    } else {
        cells[5].clone()
    };
    let votes = cells.get(6).map(|v| digits_or_zero(v)).unwrap_or_else(|| "0".to_string());

    Ok(AnimeRecord {
        title,
        alt_title: cells[3].clone(),
        cover,
        url,
        air_date: AirDate::new(year, month, day),
        episodes: cells[4].parse().unwrap_or(Episodes::Unknown),
        score,
        votes,
    })
}

/// Result of reading a report back.
#[derive(Debug, Default)]
pub struct ParsedReport {
    pub records: Vec<AnimeRecord>,
    /// Table rows that were skipped as malformed.
    pub skipped: usize,
}

/// Recover records from report text, in file order.
pub fn parse_report(text: &str) -> ParsedReport {
    let mut parsed = ParsedReport::default();
    let mut section_year: Option<i32> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with("## ") {
            if let Some(caps) = YEAR_SECTION.captures(line) {
                section_year = caps[1].parse().ok();
            } else if line == format!("## {UNKNOWN}") {
                section_year = Some(0);
            }
            continue;
        }
        if !line.starts_with('|') {
            continue;
        }

        let cells = split_cells(line);
        let first = cells.first().map(String::as_str).unwrap_or_default();
        if first == DATE_COLUMN || first.starts_with("---") {
            continue;
        }

        match parse_row(&cells, section_year) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                parsed.skipped += 1;
                warn!(
                    line = index + 1,
                    row = %truncate_for_log(line, 50),
                    error = %e,
                    "Skipping malformed report row"
                );
            }
        }
    }

    debug!(
        records = parsed.records.len(),
        skipped = parsed.skipped,
        "Parsed report"
    );
    parsed
}
