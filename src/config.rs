//! Runtime configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! YAML file (`--config`), and command-line flags / environment variables
//! (see [`crate::cli::Cli`]).
//!
//! ```yaml
//! base_url: https://bangumi.tv
//! concurrency: 3
//! max_attempts: 3
//! output: reports/Bangumi_Anime.md
//! layout: split
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_OUTPUT: &str = "Bangumi_Anime.md";

/// How merged records are distributed over report files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One report holding every year.
    #[default]
    Single,
    /// One report per air year/month under nested `YYYY/MM` folders.
    Split,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog origin; listing and detail URLs are built from it.
    pub base_url: String,
    pub user_agent: String,
    pub referer: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Total attempts per request, including the first one.
    pub max_attempts: usize,
    /// First backoff delay; doubles on every further failure.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_delay_ms: u64,
    /// Random extra delay added to every backoff, up to this bound.
    pub jitter_ms: u64,
    /// Maximum simultaneous page requests.
    pub concurrency: usize,
    /// Report file for [`Layout::Single`], root folder for [`Layout::Split`].
    pub output: PathBuf,
    pub layout: Layout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://bangumi.tv".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://bangumi.tv/".to_string(),
            timeout_secs: 20,
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
            concurrency: DEFAULT_CONCURRENCY,
            output: PathBuf::from(DEFAULT_OUTPUT),
            layout: Layout::Single,
        }
    }
}

impl Config {
    /// Load from a YAML file, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.output, PathBuf::from("Bangumi_Anime.md"));
        assert_eq!(config.layout, Layout::Single);
        assert_eq!(config.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("concurrency: 3\nlayout: split\n").unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.layout, Layout::Split);
        assert_eq!(config.base_url, "https://bangumi.tv");
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(Config::from_yaml("layout: sideways\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url: http://localhost:8080\nmax_attempts: 5").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_load_without_path() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }
}
