//! Utility functions for log formatting and file system operations.

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` characters (not bytes, report rows are mostly CJK)
/// and appends an ellipsis with the number of bytes dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Replace `path` with `contents` in one step.
///
/// The data goes to a sibling `*.tmp` file first and is then renamed over the
/// target, so readers never see a half-written report. Parent directories
/// are created as needed.
///
/// # Arguments
///
/// * `path` - Final destination
/// * `contents` - Full file contents
///
/// # Errors
///
/// Any I/O error from creating folders, writing, or renaming. A failed
/// rename leaves the `*.tmp` file behind and the target untouched.
pub async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents).await?;
    fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), bytes = contents.len(), "Wrote file");
    Ok(())
}
