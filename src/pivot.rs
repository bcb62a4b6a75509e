//! Cross-tabulation of record counts over two categorical fields.
//!
//! Categories come from the data. Labels sort numerically when both parse as
//! numbers, lexicographically otherwise, and numbers sort before text. Records
//! with a null row or column value are left out, and a record counts only
//! when its value field is non-null. Margins are sums of the data cells, so a
//! real category named `Total` clashes with the margin labels.

use crate::accumulator::Dataset;
use crate::error::{CrashDataError, Result};
use crate::types::CRASH_ID;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Label of the margin row and margin column.
pub const TOTAL_LABEL: &str = "Total";

fn default_values() -> String {
    CRASH_ID.to_string()
}

fn default_totals() -> bool {
    true
}

/// Which fields to cross-tabulate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PivotRequest {
    /// Field whose categories become rows.
    pub index: String,
    /// Field whose categories become columns.
    pub columns: String,
    /// Field whose non-null occurrences are counted.
    #[serde(default = "default_values")]
    pub values: String,
    /// Append the `Total` row and column.
    #[serde(default = "default_totals")]
    pub totals: bool,
}

impl PivotRequest {
    pub fn new(index: impl Into<String>, columns: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            columns: columns.into(),
            values: default_values(),
            totals: true,
        }
    }

    pub fn values(mut self, field: impl Into<String>) -> Self {
        self.values = field.into();
        self
    }

    pub fn totals(mut self, enabled: bool) -> Self {
        self.totals = enabled;
        self
    }
}

/// Region a cell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Data,
    /// Row total, column total or grand total.
    Margin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotCell<'a> {
    pub row: &'a str,
    pub column: &'a str,
    pub count: u64,
    pub kind: CellKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Margins {
    rows: Vec<u64>,
    columns: Vec<u64>,
    grand: u64,
}

/// Counts by (row category, column category) with optional margins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    index: String,
    columns: String,
    values: String,
    row_labels: Vec<String>,
    column_labels: Vec<String>,
    // Row-major, row_labels.len() * column_labels.len()
    counts: Vec<u64>,
    margins: Option<Margins>,
}

/// Build the cross-tabulation described by `request` over `dataset`.
pub fn build_pivot(dataset: &Dataset, request: &PivotRequest) -> Result<PivotTable> {
    if dataset.is_empty() {
        return Err(CrashDataError::EmptyDataset);
    }
    for field in [&request.index, &request.columns, &request.values] {
        if !dataset.has_column(field) {
            return Err(CrashDataError::MissingColumn(field.clone()));
        }
    }

    let observed: Vec<(&str, &str)> = dataset
        .records()
        .filter_map(|record| {
            record.get(&request.values)?;
            Some((record.get(&request.index)?, record.get(&request.columns)?))
        })
        .collect();

    let row_labels = categories(observed.iter().map(|(r, _)| *r));
    let column_labels = categories(observed.iter().map(|(_, c)| *c));
    let row_pos = positions(&row_labels);
    let col_pos = positions(&column_labels);

    let width = column_labels.len();
    let mut counts = vec![0u64; row_labels.len() * width];
    for (row, column) in &observed {
        counts[row_pos[row] * width + col_pos[column]] += 1;
    }

    let margins = request.totals.then(|| {
        let rows: Vec<u64> = counts.chunks(width.max(1)).map(|r| r.iter().sum()).collect();
        let columns: Vec<u64> = (0..width)
            .map(|c| (0..row_labels.len()).map(|r| counts[r * width + c]).sum())
            .collect();
        let grand = counts.iter().sum();
        Margins { rows, columns, grand }
    });

    debug!(
        index = %request.index,
        columns = %request.columns,
        rows = row_labels.len(),
        cols = column_labels.len(),
        counted = observed.len(),
        "built pivot table"
    );

    Ok(PivotTable {
        index: request.index.clone(),
        columns: request.columns.clone(),
        values: request.values.clone(),
        row_labels,
        column_labels,
        counts,
        margins,
    })
}

fn categories<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut labels: Vec<&str> = values.collect();
    labels.sort_by(|a, b| compare_labels(a, b));
    labels.dedup();
    labels.into_iter().map(str::to_string).collect()
}

fn positions(labels: &[String]) -> HashMap<&str, usize> {
    labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect()
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    match (numeric_label(a), numeric_label(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

// "inf" and "NaN" parse as floats but are text labels here
fn numeric_label(label: &str) -> Option<f64> {
    label.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

impl PivotTable {
    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn columns_name(&self) -> &str {
        &self.columns
    }

    pub fn values_name(&self) -> &str {
        &self.values
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    pub fn has_totals(&self) -> bool {
        self.margins.is_some()
    }

    /// Rows and columns of the full grid, margins included.
    pub fn shape(&self) -> (usize, usize) {
        let extra = usize::from(self.has_totals());
        (self.row_labels.len() + extra, self.column_labels.len() + extra)
    }

    /// Count at a labeled position. `Total` addresses the margins when present.
    /// Category pairs never observed read as zero.
    pub fn count(&self, row: &str, column: &str) -> Option<u64> {
        let r = self.row_position(row)?;
        let c = self.column_position(column)?;
        self.cell_at(r, c).map(|cell| cell.count)
    }

    pub fn row_total(&self, row: &str) -> Option<u64> {
        self.count(row, TOTAL_LABEL).filter(|_| self.has_totals())
    }

    pub fn column_total(&self, column: &str) -> Option<u64> {
        self.count(TOTAL_LABEL, column).filter(|_| self.has_totals())
    }

    pub fn grand_total(&self) -> Option<u64> {
        self.margins.as_ref().map(|m| m.grand)
    }

    /// Cell at a grid position, margins following the data rows and columns.
    pub fn cell_at(&self, r: usize, c: usize) -> Option<PivotCell<'_>> {
        let rows = self.row_labels.len();
        let cols = self.column_labels.len();
        let row_label = self.row_labels.get(r).map(String::as_str);
        let col_label = self.column_labels.get(c).map(String::as_str);

        match (row_label, col_label) {
            (Some(row), Some(column)) => Some(PivotCell {
                row,
                column,
                count: self.counts[r * cols + c],
                kind: CellKind::Data,
            }),
            _ => {
                let margins = self.margins.as_ref()?;
                if r > rows || c > cols {
                    return None;
                }
                let count = match (row_label, col_label) {
                    (Some(_), None) => margins.rows[r],
                    (None, Some(_)) => margins.columns[c],
                    _ => margins.grand,
                };
                Some(PivotCell {
                    row: row_label.unwrap_or(TOTAL_LABEL),
                    column: col_label.unwrap_or(TOTAL_LABEL),
                    count,
                    kind: CellKind::Margin,
                })
            }
        }
    }

    /// Every cell of the grid in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = PivotCell<'_>> {
        let (rows, cols) = self.shape();
        (0..rows).flat_map(move |r| (0..cols).filter_map(move |c| self.cell_at(r, c)))
    }

    /// The non-total region.
    pub fn data_cells(&self) -> impl Iterator<Item = PivotCell<'_>> {
        self.cells().filter(|cell| cell.kind == CellKind::Data)
    }

    /// The `Total` row, `Total` column and grand total. Empty without totals.
    pub fn margin_cells(&self) -> impl Iterator<Item = PivotCell<'_>> {
        self.cells().filter(|cell| cell.kind == CellKind::Margin)
    }

    pub fn max_data_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn max_margin_count(&self) -> u64 {
        self.margin_cells().map(|cell| cell.count).max().unwrap_or(0)
    }

    fn row_position(&self, label: &str) -> Option<usize> {
        match self.row_labels.iter().position(|l| l == label) {
            Some(r) => Some(r),
            None if label == TOTAL_LABEL && self.has_totals() => Some(self.row_labels.len()),
            None => None,
        }
    }

    fn column_position(&self, label: &str) -> Option<usize> {
        match self.column_labels.iter().position(|l| l == label) {
            Some(c) => Some(c),
            None if label == TOTAL_LABEL && self.has_totals() => Some(self.column_labels.len()),
            None => None,
        }
    }
}

impl fmt::Display for PivotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.shape();
        let corner = format!("{} \\ {}", self.index, self.columns);

        let mut header = vec![corner];
        header.extend((0..cols).filter_map(|c| self.cell_at(0, c)).map(|cell| cell.column.to_string()));
        let mut lines = vec![header];
        for r in 0..rows {
            let mut line = Vec::with_capacity(cols + 1);
            if let Some(first) = self.cell_at(r, 0) {
                line.push(first.row.to_string());
            }
            line.extend((0..cols).filter_map(|c| self.cell_at(r, c)).map(|cell| cell.count.to_string()));
            lines.push(line);
        }

        let widths: Vec<usize> = (0..=cols)
            .map(|i| lines.iter().filter_map(|l| l.get(i)).map(String::len).max().unwrap_or(0))
            .collect();

        for line in &lines {
            let padded: Vec<String> = line
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    if i == 0 {
                        format!("{:<w$}", s, w = widths[i])
                    } else {
                        format!("{:>w$}", s, w = widths[i])
                    }
                })
                .collect();
            writeln!(f, "{}", padded.join("  "))?;
        }
        Ok(())
    }
}
