use crate::accumulator::Accumulator;
use crate::config::AppConfig;
use crate::error::{CrashDataError, Result};
use crate::types::{parse_cell, RecordBatch};
use anyhow::Context;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Load every configured input in order and merge it into one accumulator.
pub fn load_data(config: &AppConfig) -> anyhow::Result<Accumulator> {
    let mut accumulator = Accumulator::with_strategy(config.input.merge_strategy);
    let columns = config.input.columns.as_deref();

    for path in &config.input.files {
        let batch = load_path(path, columns)
            .with_context(|| format!("Failed to load crash records from {:?}", path))?;
        let summary = accumulator
            .merge(batch)
            .with_context(|| format!("Failed to merge crash records from {:?}", path))?;
        info!(file = ?path, total = summary.total, "merged input");
    }

    Ok(accumulator)
}

/// Open a CSV file and load it with [`load`].
pub fn load_path(path: &Path, columns: Option<&[String]>) -> Result<RecordBatch> {
    let file = File::open(path)?;
    load(file, columns)
}

/// Read one crash export into a batch.
///
/// The first line is an annotation and is skipped; the second is the header.
/// When `columns` is given the batch holds exactly those fields in that order.
pub fn load<R: Read>(source: R, columns: Option<&[String]>) -> Result<RecordBatch> {
    let mut reader = BufReader::new(source);

    let mut annotation = String::new();
    if reader.read_line(&mut annotation)? == 0 {
        return Err(CrashDataError::MissingHeader);
    }
    debug!(annotation = annotation.trim_end(), "skipped annotation line");

    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let raw_headers = rdr.headers()?.clone();
    if raw_headers.is_empty() {
        return Err(CrashDataError::MissingHeader);
    }
    let headers = dedupe_headers(raw_headers.iter());

    // Source index for every output column
    let projection: Vec<usize> = match columns {
        Some(wanted) => wanted
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| CrashDataError::MissingColumn(name.clone()))
            })
            .collect::<Result<_>>()?,
        None => (0..headers.len()).collect(),
    };

    let mut batch = RecordBatch::new(projection.iter().map(|&i| headers[i].clone()).collect());
    for result in rdr.records() {
        let record = result?;
        let row = projection
            .iter()
            .map(|&i| record.get(i).and_then(parse_cell))
            .collect();
        batch.push_row(row)?;
    }

    debug!(rows = batch.len(), columns = batch.columns().len(), "loaded record batch");
    Ok(batch)
}

/// Rename repeated header names to `name.1`, `name.2`, ... in order of appearance.
fn dedupe_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::new();
    for name in raw {
        let count = seen.entry(name.to_string()).or_insert(0);
        if *count == 0 {
            headers.push(name.to_string());
        } else {
            headers.push(format!("{}.{}", name, count));
        }
        *count += 1;
    }
    headers
}
