//! JSON export of merged records.
//!
//! The export is write-only: it is regenerated from the Markdown report on
//! every run and never read back.
//!
//! ```json
//! [
//!   {
//!     "title": "葬送的芙莉莲",
//!     "alt_title": "葬送のフリーレン",
//!     "cover": "https://lain.bgm.tv/pic/cover/c/aa/1001.jpg",
//!     "url": "https://bangumi.tv/subject/1001",
//!     "year": 2023,
//!     "month": 9,
//!     "day": 29,
//!     "episodes": "28",
//!     "score": "9.1",
//!     "votes": "12345"
//!   }
//! ]
//! ```

use crate::error::Result;
use crate::models::AnimeRecord;
use crate::utils::write_atomic;
use std::path::Path;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_records(records: &[AnimeRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    write_atomic(path, &json).await?;
    info!("Wrote JSON export");
    Ok(())
}
