//! # Bangumi Report
//!
//! Scrapes the Bangumi anime air-time catalog by year and month and keeps a
//! Markdown report up to date across runs. The report file is the only state:
//! every run parses it back, merges in new entries, and rewrites it.
//!
//! ## Usage
//!
//! ```sh
//! bangumi_report interactive
//! bangumi_report auto --year 2024 --month 4-6
//! CONCURRENT_REQUESTS=3 bangumi_report --layout split -o reports auto --year 2010-2023
//! ```
//!
//! ## Architecture
//!
//! 1. **Planning**: turn the requested years/months into catalog targets,
//!    skipping anything that has not aired yet
//! 2. **Scraping**: per target, read the page count, then fetch and parse all
//!    pages concurrently under a semaphore
//! 3. **Merging**: parse the existing report, add entries with unseen dedup
//!    keys, and rewrite the file newest-first

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod client;
mod config;
mod error;
mod extract;
mod models;
mod outputs;
mod query;
mod scrapers;
mod utils;

use cli::Cli;
use client::{HttpSource, RetrySource};
use config::{Config, Layout};
use outputs::{json, store};
use query::plan_targets;
use scrapers::Scraper;
use utils::ensure_writable_dir;

/// Directory that must be writable before any scraping starts.
fn output_dir(config: &Config) -> PathBuf {
    match config.layout {
        Layout::Split => config.output.clone(),
        Layout::Single => config
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("bangumi_report starting up");

    // --- Configuration ---
    let args = Cli::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    debug!(?config, "Resolved configuration");

    let query = match args.query() {
        Ok(query) => query,
        Err(e) => {
            error!(error = %e, "Invalid input");
            return Err(e.into());
        }
    };
    info!(?query, concurrency = config.concurrency, "Query accepted");

    let output = std::path::absolute(&config.output).unwrap_or_else(|_| config.output.clone());
    info!(path = %output.display(), layout = ?config.layout, "Output location");

    // Early check: fail before scraping rather than after
    let dir = output_dir(&config);
    if let Err(e) = ensure_writable_dir(&dir).await {
        error!(
            path = %dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Plan and scrape ----
    let targets = plan_targets(&query, Local::now().date_naive());
    info!(count = targets.len(), "Planned catalog targets");

    let source = RetrySource::from_config(HttpSource::new(&config)?, &config);
    let scraper = Scraper::new(source, &config.base_url, config.concurrency)?;
    let records = scraper.scrape_all(&targets).await;

    // ---- Merge and write ----
    let summary = store::store(config.layout, &output, records).await?;
    info!(
        files = summary.files.len(),
        added = summary.added,
        total = summary.total,
        "Reports updated"
    );

    if let Some(path) = &args.json_output {
        if let Err(e) = json::write_records(&summary.records, path).await {
            error!(path = %path.display(), error = %e, "Failed to write JSON export");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
