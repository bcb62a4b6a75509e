use crate::accumulator::Dataset;
use crate::error::{CrashDataError, Result};
use crate::types::{LATITUDE, LONGITUDE};
use geo::{Centroid, MultiPoint, Point};
use tracing::debug;

/// Centroid and point list for a density map.
///
/// Points follow the `geo` convention: `x` is longitude, `y` is latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct DensitySummary {
    pub centroid: Point<f64>,
    pub points: Vec<Point<f64>>,
}

impl DensitySummary {
    /// `[lat, lon]` pairs in dataset order, the layout heat-map layers take.
    pub fn lat_lon_pairs(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.y(), p.x()]).collect()
    }
}

/// Collect one point per record, in dataset order, and their mean position.
pub fn summarize(dataset: &Dataset) -> Result<DensitySummary> {
    if dataset.is_empty() {
        return Err(CrashDataError::EmptyDataset);
    }
    for field in [LATITUDE, LONGITUDE] {
        if !dataset.has_column(field) {
            return Err(CrashDataError::MissingColumn(field.to_string()));
        }
    }

    let points = dataset
        .records()
        .enumerate()
        .map(|(row, record)| {
            let lat = coordinate(record.get(LATITUDE), LATITUDE, row)?;
            let lon = coordinate(record.get(LONGITUDE), LONGITUDE, row)?;
            Ok(Point::new(lon, lat))
        })
        .collect::<Result<Vec<_>>>()?;

    let centroid = MultiPoint::new(points.clone())
        .centroid()
        .ok_or(CrashDataError::EmptyDataset)?;

    debug!(
        points = points.len(),
        lat = centroid.y(),
        lon = centroid.x(),
        "summarized crash density"
    );
    Ok(DensitySummary { centroid, points })
}

fn coordinate(value: Option<&str>, column: &str, row: usize) -> Result<f64> {
    let invalid = || CrashDataError::InvalidValue {
        column: column.to_string(),
        row,
        value: value.unwrap_or_default().to_string(),
    };
    let parsed: f64 = value.ok_or_else(invalid)?.trim().parse().map_err(|_| invalid())?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(invalid())
    }
}
