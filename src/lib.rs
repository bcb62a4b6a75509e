//! Crash record accumulation, cross-tabulation and density summaries.
//!
//! CSV exports are read into [`RecordBatch`]es, merged by `CrashId` into one
//! [`Dataset`] owned by an [`Accumulator`], then either cross-tabulated into a
//! [`PivotTable`] with `Total` margins or reduced to a [`DensitySummary`] for
//! a heat map.
//!
//! ```no_run
//! use ctcrash::{build_pivot, data, Accumulator, PivotRequest};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), ctcrash::CrashDataError> {
//! let mut acc = Accumulator::new();
//! acc.merge(data::load_path(Path::new("crashes.csv"), None)?)?;
//! let pivot = build_pivot(acc.dataset(), &PivotRequest::new("Weather", "RoadType"))?;
//! println!("{pivot}");
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod config;
pub mod data;
pub mod density;
pub mod error;
pub mod pivot;
pub mod render;
pub mod types;

pub use accumulator::{Accumulator, Dataset, MergeStrategy, MergeSummary};
pub use density::{summarize, DensitySummary};
pub use error::{CrashDataError, Result};
pub use pivot::{build_pivot, CellKind, PivotCell, PivotRequest, PivotTable, TOTAL_LABEL};
pub use types::{Record, RecordBatch, CRASH_ID, LATITUDE, LONGITUDE};
