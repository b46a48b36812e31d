//! Incremental report updates.
//!
//! A report is read back with [`parse_report`], merged with freshly scraped
//! records, and rewritten in full. Existing rows always win: a scraped record
//! whose [`DedupKey`](crate::models::DedupKey) is already present is dropped,
//! so re-running the same query leaves the file unchanged.

use crate::config::Layout;
use crate::error::Result;
use crate::models::{AirDate, AnimeRecord};
use crate::outputs::markdown::{parse_report, render_report, sort_records};
use crate::utils::write_atomic;
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Outcome of merging one batch into one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Every record that ends up in the report, newest first.
    pub records: Vec<AnimeRecord>,
    /// Rows recovered from the existing report.
    pub existing: usize,
    /// Newly inserted records.
    pub added: usize,
    /// Newly inserted records per air year.
    pub added_per_year: BTreeMap<i32, usize>,
}

/// Merge `incoming` into `existing` by dedup key; first occurrence wins.
pub fn merge(existing: Vec<AnimeRecord>, incoming: Vec<AnimeRecord>) -> MergeOutcome {
    let mut seen = HashSet::new();
    let mut outcome = MergeOutcome {
        existing: existing.len(),
        ..Default::default()
    };

    for record in existing {
        if seen.insert(record.key()) {
            outcome.records.push(record);
        }
    }
    for record in incoming {
        if seen.insert(record.key()) {
            outcome.added += 1;
            *outcome
                .added_per_year
                .entry(record.air_date.year)
                .or_default() += 1;
            outcome.records.push(record);
        }
    }

    sort_records(&mut outcome.records);
    outcome
}

/// Records stored in the report at `path`; empty when the file does not exist.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::error::Error::Io) when the file exists but
/// cannot be read as UTF-8 text.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_report(path: &Path) -> Result<Vec<AnimeRecord>> {
    if !fs::try_exists(path).await? {
        info!("No existing report; starting fresh");
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).await?;
    let parsed = parse_report(&text);
    info!(
        lines = text.lines().count(),
        records = parsed.records.len(),
        skipped = parsed.skipped,
        "Parsed existing report"
    );
    Ok(parsed.records)
}

fn log_outcome(path: &Path, outcome: &MergeOutcome) {
    info!(
        path = %path.display(),
        existing = outcome.existing,
        added = outcome.added,
        total = outcome.records.len(),
        "Merged report"
    );
    for (year, count) in outcome.added_per_year.iter().rev() {
        info!(year, count, "New records for year");
    }
}

/// Read, merge and rewrite a single report file.
///
/// # Arguments
///
/// * `path` - Report file; created along with its parent folders if missing
/// * `incoming` - Freshly scraped records, in any order
///
/// # Returns
///
/// The [`MergeOutcome`] describing what ended up in the file.
///
/// # Errors
///
/// Fails when the existing report cannot be read (I/O or invalid UTF-8) or
/// the new one cannot be written. An unreadable report is never overwritten.
#[instrument(level = "info", skip_all, fields(path = %path.display(), incoming = incoming.len()))]
pub async fn update_report(path: &Path, incoming: Vec<AnimeRecord>) -> Result<MergeOutcome> {
    let existing = load_report(path).await?;
    let outcome = merge(existing, incoming);
    write_atomic(path, &render_report(&outcome.records)).await?;
    log_outcome(path, &outcome);
    Ok(outcome)
}

/// Report path for a record's air date in the split layout.
///
/// `root/2021/04/Bangumi_2021_04.md`, or `root/2021/Bangumi_2021.md` when the
/// month is unknown, or `root/unknown/Bangumi_unknown.md` without a year.
pub fn split_path(root: &Path, date: &AirDate) -> PathBuf {
    if date.year == 0 {
        return root.join("unknown").join("Bangumi_unknown.md");
    }
    let year = date.year.to_string();
    if date.month == 0 {
        root.join(&year).join(format!("Bangumi_{year}.md"))
    } else {
        let month = format!("{:02}", date.month);
        root.join(&year)
            .join(&month)
            .join(format!("Bangumi_{year}_{month}.md"))
    }
}

/// Distribute records over per-year/month reports and update each one.
#[instrument(level = "info", skip_all, fields(root = %root.display(), incoming = incoming.len()))]
pub async fn update_split(
    root: &Path,
    incoming: Vec<AnimeRecord>,
) -> Result<Vec<(PathBuf, MergeOutcome)>> {
    let groups = incoming
        .into_iter()
        .into_group_map_by(|record| split_path(root, &record.air_date));

    let mut outcomes = Vec::with_capacity(groups.len());
    for (path, records) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        let outcome = update_report(&path, records).await?;
        outcomes.push((path, outcome));
    }
    info!(files = outcomes.len(), "Updated split reports");
    Ok(outcomes)
}

/// Total across every file touched by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: Vec<PathBuf>,
    pub added: usize,
    pub total: usize,
    /// Records to export; see [`store`].
    pub records: Vec<AnimeRecord>,
}

/// Persist a run's records according to `layout`.
///
/// # Arguments
///
/// * `layout` - Single report or per-year/month files
/// * `output` - Report file for [`Layout::Single`], root folder for [`Layout::Split`]
/// * `incoming` - Everything scraped in this run
///
/// # Returns
///
/// A [`RunSummary`]. For [`Layout::Single`] it carries the whole merged
/// report; for [`Layout::Split`] only this run's scraped records, since the
/// other files were not touched.
///
/// # Errors
///
/// Propagates the first failing [`update_report`]; files already written
/// by then stay written.
pub async fn store(layout: Layout, output: &Path, incoming: Vec<AnimeRecord>) -> Result<RunSummary> {
    match layout {
        Layout::Single => {
            let outcome = update_report(output, incoming).await?;
            Ok(RunSummary {
                files: vec![output.to_path_buf()],
                added: outcome.added,
                total: outcome.records.len(),
                records: outcome.records,
            })
        }
        Layout::Split => {
            let mut scraped = incoming.clone();
            sort_records(&mut scraped);
            let outcomes = update_split(output, incoming).await?;
            Ok(RunSummary {
                files: outcomes.iter().map(|(p, _)| p.clone()).collect(),
                added: outcomes.iter().map(|(_, o)| o.added).sum(),
                total: outcomes.iter().map(|(_, o)| o.records.len()).sum(),
                records: scraped,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Episodes;
    use tempfile::TempDir;

    fn record(title: &str, year: i32, eps: u32, url: &str) -> AnimeRecord {
        AnimeRecord {
            title: title.to_string(),
            url: url.to_string(),
            air_date: AirDate::new(year, 4, 1),
            episodes: Episodes::Count(eps),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_existing_wins() {
        let existing = vec![AnimeRecord {
            score: "7.0".to_string(),
            ..record("Foo", 2021, 12, "https://bangumi.tv/subject/1")
        }];
        let incoming = vec![AnimeRecord {
            score: "9.9".to_string(),
            alt_title: "changed".to_string(),
            ..record("Foo", 2021, 12, "https://bangumi.tv/subject/1")
        }];
        let outcome = merge(existing.clone(), incoming);
        assert_eq!(outcome.records, existing);
        assert_eq!(outcome.added, 0);
        assert!(outcome.added_per_year.is_empty());
    }

    #[test]
    fn test_merge_counts_per_year_and_collapses_incoming_duplicates() {
        let incoming = vec![
            record("A", 2021, 12, "https://bangumi.tv/subject/1"),
            record("A", 2021, 12, "https://bangumi.tv/subject/1"),
            record("B", 2021, 12, "https://bangumi.tv/subject/2"),
            record("C", 2019, 12, "https://bangumi.tv/subject/3"),
        ];
        let outcome = merge(Vec::new(), incoming);
        assert_eq!(outcome.added, 3);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(
            outcome.added_per_year,
            BTreeMap::from([(2019, 1), (2021, 2)])
        );
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let records = vec![
            record("A", 2021, 12, "https://bangumi.tv/subject/1"),
            record("B", 2020, 24, "https://bangumi.tv/subject/2"),
        ];
        let rendered = render_report(&records);
        let parsed = parse_report(&rendered).records;
        let outcome = merge(parsed.clone(), parsed);
        assert_eq!(outcome.added, 0);
        assert_eq!(render_report(&outcome.records), rendered);
    }

    #[tokio::test]
    async fn test_update_report_sample_scenario() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Bangumi_Anime.md");
        let foo = record("Foo", 2021, 12, "https://bangumi.tv/subject/100");
        let bar = record("Bar", 2021, 24, "https://bangumi.tv/subject/200");

        update_report(&path, vec![foo.clone()]).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();
        let foo_row = before
            .lines()
            .find(|l| l.contains("[Foo]"))
            .unwrap()
            .to_string();

        let outcome = update_report(&path, vec![foo.clone(), bar.clone()])
            .await
            .unwrap();
        assert_eq!(outcome.existing, 1);
        assert_eq!(outcome.added, 1);

        let after = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = after
            .lines()
            .filter(|l| l.starts_with("| 2021"))
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], foo_row);
        assert!(rows[1].contains("[Bar](https://bangumi.tv/subject/200)"));
        assert_eq!(after.matches("## 2021年").count(), 1);
    }

    #[tokio::test]
    async fn test_rerun_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        let batch = vec![
            record("A", 2021, 12, "https://bangumi.tv/subject/1"),
            record("B", 2020, 24, "https://bangumi.tv/subject/2"),
        ];
        update_report(&path, batch.clone()).await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        let outcome = update_report(&path, batch).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_missing_report_is_empty() {
        let dir = TempDir::new().unwrap();
        let records = load_report(&dir.path().join("absent.md")).await.unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_split_path() {
        let root = Path::new("out");
        assert_eq!(
            split_path(root, &AirDate::new(2021, 4, 3)),
            PathBuf::from("out/2021/04/Bangumi_2021_04.md")
        );
        assert_eq!(
            split_path(root, &AirDate::new(2021, 0, 0)),
            PathBuf::from("out/2021/Bangumi_2021.md")
        );
        assert_eq!(
            split_path(root, &AirDate::default()),
            PathBuf::from("out/unknown/Bangumi_unknown.md")
        );
    }

    #[tokio::test]
    async fn test_store_split_layout() {
        let dir = TempDir::new().unwrap();
        let mut july = record("July", 2022, 12, "https://bangumi.tv/subject/3");
        july.air_date = AirDate::new(2022, 7, 2);
        let batch = vec![
            record("A", 2021, 12, "https://bangumi.tv/subject/1"),
            record("B", 2021, 12, "https://bangumi.tv/subject/2"),
            july,
        ];
        let summary = store(Layout::Split, dir.path(), batch).await.unwrap();
        assert_eq!(summary.added, 3);
        assert_eq!(
            summary.files,
            vec![
                dir.path().join("2021/04/Bangumi_2021_04.md"),
                dir.path().join("2022/07/Bangumi_2022_07.md"),
            ]
        );
        let april = std::fs::read_to_string(&summary.files[0]).unwrap();
        assert_eq!(parse_report(&april).records.len(), 2);
        assert_eq!(summary.records[0].title, "July");
    }

    #[tokio::test]
    async fn test_store_single_layout_reports_merged_total() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("Bangumi_Anime.md");
        store(
            Layout::Single,
            &path,
            vec![record("A", 2021, 12, "https://bangumi.tv/subject/1")],
        )
        .await
        .unwrap();
        let summary = store(
            Layout::Single,
            &path,
            vec![record("B", 2021, 12, "https://bangumi.tv/subject/2")],
        )
        .await
        .unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.records.len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_with_wrapped_titles_adds_nothing() {
        use crate::query::Target;
        use crate::scrapers::bangumi::{parse_page, tests::MULTILINE_PAGE};
        use url::Url;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Bangumi_Anime.md");
        let base = Url::parse("https://bangumi.tv").unwrap();
        let target = Target { year: 2021, month: Some(4) };
        let scraped = parse_page(MULTILINE_PAGE, &base, &target);

        let first_run = update_report(&path, scraped.clone()).await.unwrap();
        assert_eq!(first_run.added, 1);
        let first = std::fs::read_to_string(&path).unwrap();

        let second_run = update_report(&path, scraped).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(second_run.added, 0);
        assert_eq!(second_run.records.len(), 1);
        assert_eq!(first, second);
    }
}
