//! The canonical working dataset and the rules for merging batches into it.

use crate::error::{CrashDataError, Result};
use crate::types::{Cell, Record, RecordBatch, CRASH_ID};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// How a batch is combined with a non-empty dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Inner join on `CrashId`: only ids present on both sides survive.
    #[default]
    Intersect,
    /// Upsert on `CrashId`: matching ids take the batch's non-null values,
    /// unseen ids are appended.
    UnionByKey,
}

/// What a merge did to the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub strategy: MergeStrategy,
    pub matched: usize,
    /// Records discarded from either side.
    pub dropped: usize,
    pub appended: usize,
    /// Batch rows skipped for a repeated or null id.
    pub skipped: usize,
    pub total: usize,
}

/// Crash records keyed by `CrashId`, at most one record per id.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    table: RecordBatch,
    key: usize,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn columns(&self) -> &[String] {
        &self.table.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.table.column_index(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.table.records()
    }

    pub fn get(&self, crash_id: &str) -> Option<Record<'_>> {
        let row = *self.index.get(crash_id)?;
        self.table.record(row)
    }

    pub fn contains(&self, crash_id: &str) -> bool {
        self.index.contains_key(crash_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let key = self.key;
        self.table.rows.iter().filter_map(move |row| row[key].as_deref())
    }

    fn from_keyed(table: RecordBatch, key: usize) -> Self {
        let index = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row[key].clone().map(|id| (id, i)))
            .collect();
        Self { table, key, index }
    }
}

/// Sole owner and writer of the [`Dataset`].
#[derive(Debug, Default)]
pub struct Accumulator {
    dataset: Dataset,
    strategy: MergeStrategy,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: MergeStrategy) -> Self {
        Self {
            dataset: Dataset::default(),
            strategy,
        }
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    /// Merge `batch` into the dataset.
    ///
    /// An empty dataset takes the batch as is. Otherwise the configured
    /// [`MergeStrategy`] decides which records survive. A batch without a
    /// `CrashId` column is rejected and the dataset is left untouched.
    pub fn merge(&mut self, batch: RecordBatch) -> Result<MergeSummary> {
        let (batch, batch_key, skipped) = keyed_batch(batch)?;

        let summary = if self.dataset.is_empty() {
            let appended = batch.len();
            self.dataset = Dataset::from_keyed(batch, batch_key);
            MergeSummary {
                strategy: self.strategy,
                matched: 0,
                dropped: 0,
                appended,
                skipped,
                total: appended,
            }
        } else {
            let (table, key, mut summary) = match self.strategy {
                MergeStrategy::Intersect => intersect(&self.dataset, &batch, batch_key),
                MergeStrategy::UnionByKey => union_by_key(&self.dataset, &batch, batch_key),
            };
            summary.skipped = skipped;
            self.dataset = Dataset::from_keyed(table, key);
            summary
        };

        info!(
            strategy = ?summary.strategy,
            matched = summary.matched,
            dropped = summary.dropped,
            appended = summary.appended,
            total = summary.total,
            "merged batch"
        );
        Ok(summary)
    }
}

/// Drop rows with a null or repeated `CrashId`, keeping the first occurrence.
fn keyed_batch(batch: RecordBatch) -> Result<(RecordBatch, usize, usize)> {
    let key = batch
        .column_index(CRASH_ID)
        .ok_or_else(|| CrashDataError::MissingColumn(CRASH_ID.to_string()))?;

    let RecordBatch { columns, rows } = batch;
    let mut seen = HashSet::with_capacity(rows.len());
    let mut kept = RecordBatch::new(columns);
    let mut skipped = 0;

    for row in rows {
        match row[key].clone() {
            None => {
                warn!("skipping record with a null {}", CRASH_ID);
                skipped += 1;
            }
            Some(id) if seen.contains(&id) => {
                warn!(crash_id = %id, "skipping repeated {}", CRASH_ID);
                skipped += 1;
            }
            Some(id) => {
                seen.insert(id);
                kept.rows.push(row);
            }
        }
    }

    Ok((kept, key, skipped))
}

fn batch_positions(batch: &RecordBatch, key: usize) -> HashMap<&str, usize> {
    batch
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row[key].as_deref().map(|id| (id, i)))
        .collect()
}

/// Inner join in dataset order. Shared non-key columns are kept from both
/// sides, renamed with `_x` (dataset) and `_y` (batch). A suffix is repeated
/// until the name is free, so output column names stay unique.
fn intersect(
    dataset: &Dataset,
    batch: &RecordBatch,
    batch_key: usize,
) -> (RecordBatch, usize, MergeSummary) {
    let left_key = dataset.key;
    let left: Vec<&str> = dataset.table.columns.iter().map(String::as_str).collect();
    let right: Vec<&str> = batch
        .columns
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != batch_key)
        .map(|(_, name)| name.as_str())
        .collect();

    let shared: HashSet<&str> = left
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != left_key && right.contains(*name))
        .map(|(_, name)| *name)
        .collect();
    let mut taken: HashSet<String> = left
        .iter()
        .chain(right.iter())
        .filter(|name| !shared.contains(*name))
        .map(|name| name.to_string())
        .collect();

    let mut rename = |name: &str, suffix: &str| {
        if !shared.contains(name) {
            return name.to_string();
        }
        let mut candidate = format!("{}{}", name, suffix);
        while taken.contains(&candidate) {
            candidate.push_str(suffix);
        }
        taken.insert(candidate.clone());
        candidate
    };
    let mut columns: Vec<String> = Vec::with_capacity(left.len() + right.len());
    for (i, &name) in left.iter().enumerate() {
        columns.push(if i == left_key { name.to_string() } else { rename(name, "_x") });
    }
    for &name in &right {
        columns.push(rename(name, "_y"));
    }

    let positions = batch_positions(batch, batch_key);
    let mut table = RecordBatch::new(columns);
    for row in &dataset.table.rows {
        let Some(&j) = row[left_key].as_deref().and_then(|id| positions.get(id)) else {
            continue;
        };
        let mut joined: Vec<Cell> = row.clone();
        joined.extend(
            batch.rows[j]
                .iter()
                .enumerate()
                .filter(|(c, _)| *c != batch_key)
                .map(|(_, v)| v.clone()),
        );
        table.rows.push(joined);
    }

    let matched = table.len();
    let summary = MergeSummary {
        strategy: MergeStrategy::Intersect,
        matched,
        dropped: (dataset.len() - matched) + (batch.len() - matched),
        appended: 0,
        skipped: 0,
        total: matched,
    };
    (table, left_key, summary)
}

/// Upsert in dataset order, then unseen batch records in batch order.
/// Columns are unioned by name.
fn union_by_key(
    dataset: &Dataset,
    batch: &RecordBatch,
    batch_key: usize,
) -> (RecordBatch, usize, MergeSummary) {
    let left_key = dataset.key;
    let mut columns = dataset.table.columns.clone();

    // Target column for every batch column
    let target: Vec<usize> = batch
        .columns
        .iter()
        .enumerate()
        .map(|(j, name)| {
            if j == batch_key {
                return left_key;
            }
            match columns.iter().position(|c| c == name) {
                Some(i) => i,
                None => {
                    columns.push(name.clone());
                    columns.len() - 1
                }
            }
        })
        .collect();

    let width = columns.len();
    let positions = batch_positions(batch, batch_key);
    let mut table = RecordBatch::new(columns);
    let mut matched = 0;

    for row in &dataset.table.rows {
        let mut merged = row.clone();
        merged.resize(width, None);
        if let Some(&j) = row[left_key].as_deref().and_then(|id| positions.get(id)) {
            matched += 1;
            for (c, value) in batch.rows[j].iter().enumerate() {
                if value.is_some() {
                    merged[target[c]] = value.clone();
                }
            }
        }
        table.rows.push(merged);
    }

    let mut appended = 0;
    for row in &batch.rows {
        let is_new = row[batch_key].as_deref().is_some_and(|id| !dataset.contains(id));
        if !is_new {
            continue;
        }
        let mut fresh: Vec<Cell> = vec![None; width];
        for (c, value) in row.iter().enumerate() {
            fresh[target[c]] = value.clone();
        }
        table.rows.push(fresh);
        appended += 1;
    }

    let summary = MergeSummary {
        strategy: MergeStrategy::UnionByKey,
        matched,
        dropped: 0,
        appended,
        skipped: 0,
        total: table.len(),
    };
    (table, left_key, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn ids(dataset: &Dataset) -> Vec<&str> {
        dataset.ids().collect()
    }

    fn scenario_a() -> Accumulator {
        let mut acc = Accumulator::new();
        acc.merge(RecordBatch::from_rows(&["CrashId", "Type"], &[&["1", "A"], &["2", "B"]]).unwrap())
            .unwrap();
        acc
    }

    #[test]
    fn test_first_load_is_verbatim() {
        let acc = scenario_a();
        let dataset = acc.dataset();
        assert_eq!(dataset.len(), 2);
        assert_eq!(ids(dataset), vec!["1", "2"]);
        assert_eq!(dataset.columns(), &["CrashId".to_string(), "Type".to_string()]);
        assert_eq!(dataset.get("2").unwrap().get("Type"), Some("B"));
    }

    #[test]
    fn test_intersect_narrows_and_joins_fields() {
        let mut acc = scenario_a();
        let summary = acc
            .merge(RecordBatch::from_rows(
                &["CrashId", "Type", "Weather"],
                &[&["2", "B", "Rain"]],
            ).unwrap())
            .unwrap();

        let dataset = acc.dataset();
        assert_eq!(ids(dataset), vec!["2"]);
        assert!(dataset.has_column("Weather"));
        let record = dataset.get("2").unwrap();
        assert_eq!(record.get("Weather"), Some("Rain"));
        assert_eq!(record.get("Type_x"), Some("B"));
        assert_eq!(record.get("Type_y"), Some("B"));
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.total, 1);
    }

    #[test]
    fn test_intersect_with_disjoint_ids_empties_dataset() {
        let mut acc = scenario_a();
        let summary = acc
            .merge(RecordBatch::from_rows(&["CrashId", "Road"], &[&["7", "Hwy"]]).unwrap())
            .unwrap();
        assert!(acc.dataset().is_empty());
        assert_eq!(summary.dropped, 3);
        assert!(!acc.dataset().contains("1"));
    }

    #[test]
    fn test_empty_dataset_takes_next_batch_verbatim() {
        let mut acc = scenario_a();
        acc.merge(RecordBatch::from_rows(&["CrashId"], &[&["9"]]).unwrap()).unwrap();
        assert!(acc.dataset().is_empty());

        acc.merge(RecordBatch::from_rows(&["CrashId", "Road"], &[&["5", "Local"], &["6", "Hwy"]]).unwrap())
            .unwrap();
        assert_eq!(ids(acc.dataset()), vec!["5", "6"]);
        assert_eq!(acc.dataset().columns().len(), 2);
    }

    #[test]
    fn test_intersect_identical_ids_keeps_dataset_order() {
        let mut acc = scenario_a();
        acc.merge(RecordBatch::from_rows(&["CrashId", "Road"], &[&["2", "Local"], &["1", "Hwy"]]).unwrap())
            .unwrap();
        assert_eq!(ids(acc.dataset()), vec!["1", "2"]);
        assert_eq!(acc.dataset().get("1").unwrap().get("Road"), Some("Hwy"));
    }

    #[test]
    fn test_union_by_key_upserts_and_appends() {
        let mut acc = Accumulator::with_strategy(MergeStrategy::UnionByKey);
        acc.merge(RecordBatch::from_rows(&["CrashId", "Type"], &[&["1", "A"], &["2", "B"]]).unwrap())
            .unwrap();
        let summary = acc
            .merge(RecordBatch::from_rows(
                &["CrashId", "Type", "Weather"],
                &[&["2", "", "Rain"], &["3", "C", "Clear"]],
            ).unwrap())
            .unwrap();

        let dataset = acc.dataset();
        assert_eq!(ids(dataset), vec!["1", "2", "3"]);
        // A null incoming value does not overwrite
        assert_eq!(dataset.get("2").unwrap().get("Type"), Some("B"));
        assert_eq!(dataset.get("2").unwrap().get("Weather"), Some("Rain"));
        assert_eq!(dataset.get("1").unwrap().get("Weather"), None);
        assert_eq!(dataset.get("3").unwrap().get("Type"), Some("C"));
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.appended, 1);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn test_missing_key_leaves_dataset_untouched() {
        let mut acc = scenario_a();
        let err = acc
            .merge(RecordBatch::from_rows(&["Type"], &[&["A"]]).unwrap())
            .unwrap_err();
        assert!(matches!(err, CrashDataError::MissingColumn(ref c) if c == "CrashId"));
        assert_eq!(ids(acc.dataset()), vec!["1", "2"]);
    }

    #[test]
    fn test_repeated_and_null_ids_are_skipped() {
        let mut acc = Accumulator::new();
        let summary = acc
            .merge(RecordBatch::from_rows(
                &["CrashId", "Type"],
                &[&["1", "A"], &["1", "B"], &["", "C"], &["2", "D"]],
            ).unwrap())
            .unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(ids(acc.dataset()), vec!["1", "2"]);
        assert_eq!(acc.dataset().get("1").unwrap().get("Type"), Some("A"));

        let unique: BTreeSet<_> = acc.dataset().ids().collect();
        assert_eq!(unique.len(), acc.dataset().len());
    }

    #[test]
    fn test_repeated_shared_column_gets_unique_names() {
        let mut acc = Accumulator::new();
        for _ in 0..4 {
            acc.merge(RecordBatch::from_rows(&["CrashId", "Weather"], &[&["1", "Rain"]]).unwrap())
                .unwrap();
        }
        let columns = acc.dataset().columns();
        let unique: BTreeSet<&String> = columns.iter().collect();
        assert_eq!(columns.len(), 5);
        assert_eq!(unique.len(), columns.len());
        assert_eq!(acc.dataset().get("1").unwrap().get("Weather_y_y"), Some("Rain"));
    }
}
