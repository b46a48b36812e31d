//! Command-line interface definitions.
//!
//! Two modes share the same global options:
//!
//! ```sh
//! # Prompt for the year (range) and month (range)
//! bangumi_report interactive
//!
//! # Scheduled runs
//! bangumi_report auto --year 2024 --month 4-6 --concurrent 3
//! bangumi_report --layout split -o reports auto --year 2010-2023
//! ```

use crate::config::{Config, Layout};
use crate::error::Result;
use crate::query::{MonthRange, ScrapeQuery, YearRange, parse_optional_months};
use clap::{Parser, Subcommand};
use inquire::Text;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,

    /// Maximum simultaneous page requests
    #[arg(long, global = true, env = "CONCURRENT_REQUESTS")]
    pub concurrent: Option<usize>,

    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Report file (single layout) or root folder (split layout)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// How records are distributed over report files
    #[arg(long, global = true, value_enum)]
    pub layout: Option<Layout>,

    /// Also write the merged records as JSON to this path
    #[arg(long, global = true)]
    pub json_output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Ask for the year and month range on the terminal
    Interactive,
    /// Run without prompts, e.g. from CI
    Auto {
        /// Year or year range, e.g. `2024` or `2010-2023`
        #[arg(long)]
        year: YearRange,

        /// Month or month range within a single year, e.g. `4` or `4-7`
        #[arg(long)]
        month: Option<MonthRange>,
    },
}

impl Cli {
    /// Overlay command-line values on top of the file/default configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(concurrent) = self.concurrent {
            config.concurrency = concurrent;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
    }

    /// Resolve the query, prompting when running interactively.
    pub fn query(&self) -> Result<ScrapeQuery> {
        match &self.mode {
            Mode::Auto { year, month } => Ok(ScrapeQuery {
                years: *year,
                months: *month,
            }),
            Mode::Interactive => prompt_query(),
        }
    }
}

fn prompt_query() -> Result<ScrapeQuery> {
    let years: YearRange = Text::new("请输入要爬取的年份（支持范围，如2010-2023）:")
        .prompt()?
        .parse()?;
    let months = if years.start == years.end {
        let answer = Text::new("请输入月份（可选，支持范围，如4-7）:").prompt()?;
        parse_optional_months(&answer)?
    } else {
        None
    };
    Ok(ScrapeQuery { years, months })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_mode_parsing() {
        let cli = Cli::parse_from([
            "bangumi_report",
            "auto",
            "--year",
            "2020",
            "--month",
            "4-6",
        ]);
        let query = cli.query().unwrap();
        assert_eq!(query.years, YearRange { start: 2020, end: 2020 });
        assert_eq!(query.months, Some(MonthRange { start: 4, end: 6 }));
    }

    #[test]
    fn test_auto_mode_year_range_without_month() {
        let cli = Cli::parse_from(["bangumi_report", "auto", "--year", "2010-2023"]);
        let query = cli.query().unwrap();
        assert_eq!(query.years, YearRange { start: 2010, end: 2023 });
        assert_eq!(query.months, None);
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        let result =
            Cli::try_parse_from(["bangumi_report", "auto", "--year", "2020", "--month", "13"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["bangumi_report", "auto", "--year", "twenty"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_year_is_required_in_auto_mode() {
        assert!(Cli::try_parse_from(["bangumi_report", "auto"]).is_err());
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = Cli::parse_from([
            "bangumi_report",
            "auto",
            "--year",
            "2021",
            "--concurrent",
            "3",
            "--layout",
            "split",
            "-o",
            "reports",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.layout, Layout::Split);
        assert_eq!(config.output, PathBuf::from("reports"));
    }

    #[test]
    fn test_interactive_mode_parsing() {
        let cli = Cli::parse_from(["bangumi_report", "interactive", "--json-output", "out.json"]);
        assert!(matches!(cli.mode, Mode::Interactive));
        assert_eq!(cli.json_output, Some(PathBuf::from("out.json")));
    }
}
