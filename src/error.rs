//! Error types for loading, merging and aggregating crash records.

use std::io;
use thiserror::Error;

/// Result type alias using [`CrashDataError`].
pub type Result<T> = std::result::Result<T, CrashDataError>;

/// Errors raised by the loader, accumulator, aggregator and renderers.
#[derive(Debug, Error)]
pub enum CrashDataError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A requested field is absent from the input or the dataset.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// The source ended before its header row.
    #[error("Input has no header row")]
    MissingHeader,

    /// Aggregation or summarization was asked of a dataset with no records.
    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Invalid value {value:?} in column '{column}' at record {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The requested image would not fit in `u32` pixel dimensions.
    #[error("Image too large: {cols}x{rows} cells of {cell_size}px")]
    ImageTooLarge {
        rows: usize,
        cols: usize,
        cell_size: u32,
    },

    /// The pivot has no categories, so there is nothing to draw.
    #[error("Pivot table has no cells to render")]
    EmptyPivot,

    #[error("Image error: {0}")]
    Render(#[from] image::ImageError),
}
