use crate::error::{CrashDataError, Result};
use std::collections::HashMap;

/// Merge key carried by every crash record.
pub const CRASH_ID: &str = "CrashId";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

// Tokens read as missing values, on top of the empty cell
const NULL_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A"];

/// One field value. `None` is a missing value.
pub type Cell = Option<String>;

/// Turn a raw CSV field into a cell, mapping empty and missing-value tokens to `None`.
pub fn parse_cell(raw: &str) -> Cell {
    if raw.is_empty() || NULL_TOKENS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Rows read from one source, all sharing one ordered column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub(crate) columns: Vec<String>,
    // Every row is exactly columns.len() wide
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl RecordBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Build a batch from string literals; cells are parsed with [`parse_cell`].
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let mut batch = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            batch.push_row(row.iter().map(|v| parse_cell(v)).collect())?;
        }
        Ok(batch)
    }

    /// Append a row, rejecting one whose width differs from the column list.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(CrashDataError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        self.rows.get(row).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record {
            columns: &self.columns,
            values,
        })
    }
}

/// Read-only view of one row with its column names.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Cell],
}

impl<'a> Record<'a> {
    /// Value of `field`, or `None` when the field is absent or null.
    pub fn get(&self, field: &str) -> Option<&'a str> {
        let idx = self.columns.iter().position(|c| c == field)?;
        self.values[idx].as_deref()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.columns.iter().any(|c| c == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Owned name → value map, handy for assertions and debugging output.
    pub fn to_map(&self) -> HashMap<String, Option<String>> {
        self.fields()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_nulls() {
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell("NA"), None);
        assert_eq!(parse_cell("NaN"), None);
        assert_eq!(parse_cell("Rain"), Some("Rain".to_string()));
        // Whitespace is data, not a missing value
        assert_eq!(parse_cell(" "), Some(" ".to_string()));
    }

    #[test]
    fn test_record_lookup() {
        let batch = RecordBatch::from_rows(&["CrashId", "Type"], &[&["1", "A"], &["2", ""]]).unwrap();
        let records: Vec<_> = batch.records().collect();
        assert_eq!(records[0].get("Type"), Some("A"));
        assert_eq!(records[1].get("Type"), None);
        assert!(records[1].has_field("Type"));
        assert!(!records[1].has_field("Weather"));
        assert_eq!(records[0].get("Weather"), None);
    }

    #[test]
    fn test_record_fields_in_column_order() {
        let batch = RecordBatch::from_rows(&["CrashId", "Road"], &[&["9", "Hwy"]]).unwrap();
        let record = batch.records().next().unwrap();
        let fields: Vec<_> = record.fields().collect();
        assert_eq!(fields, vec![("CrashId", Some("9")), ("Road", Some("Hwy"))]);
        assert_eq!(record.to_map()["Road"], Some("Hwy".to_string()));
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let mut batch = RecordBatch::new(vec!["CrashId".to_string(), "Type".to_string()]);
        let err = batch.push_row(vec![Some("1".to_string())]).unwrap_err();
        assert!(matches!(
            err,
            CrashDataError::RaggedRow { row: 0, expected: 2, found: 1 }
        ));
        assert!(batch.is_empty());

        let err = RecordBatch::from_rows(&["CrashId"], &[&["1"], &["2", "extra"]]).unwrap_err();
        assert!(matches!(err, CrashDataError::RaggedRow { row: 1, .. }));
    }
}
