//! Report persistence.
//!
//! # Submodules
//!
//! - [`markdown`]: the report grammar (render and parse)
//! - [`store`]: load → merge → rewrite, for single or split layouts
//! - [`json`]: optional JSON export of the merged records
//!
//! # Output Structure
//!
//! ```text
//! Bangumi_Anime.md            # single layout
//!
//! reports/                    # split layout root
//! ├── 2021/
//! │   ├── Bangumi_2021.md     # entries with an unknown month
//! │   ├── 04/
//! │   │   └── Bangumi_2021_04.md
//! │   └── 07/
//! │       └── Bangumi_2021_07.md
//! └── unknown/
//!     └── Bangumi_unknown.md
//! ```

pub mod json;
pub mod markdown;
pub mod store;
