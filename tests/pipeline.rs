use std::io::Write;
use std::path::PathBuf;

use ctcrash::config::AppConfig;
use ctcrash::data::{load_data, load_path};
use ctcrash::{build_pivot, summarize, Accumulator, CrashDataError, MergeStrategy, PivotRequest};
use tempfile::{tempdir, NamedTempFile};

fn export(body: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "Exported from the crash repository\n{}", body).unwrap();
    tmp
}

#[test]
fn test_first_load_then_narrowing_merge() {
    let first = export("CrashId,Type\n1,A\n2,B\n");
    let second = export("CrashId,Type,Weather\n2,B,Rain\n");

    let mut acc = Accumulator::new();
    acc.merge(load_path(first.path(), None).unwrap()).unwrap();
    assert_eq!(acc.dataset().ids().collect::<Vec<_>>(), vec!["1", "2"]);

    acc.merge(load_path(second.path(), None).unwrap()).unwrap();
    let dataset = acc.dataset();
    assert_eq!(dataset.ids().collect::<Vec<_>>(), vec!["2"]);
    assert_eq!(dataset.get("2").unwrap().get("Weather"), Some("Rain"));
}

#[test]
fn test_pivot_from_file() {
    let file = export(
        "CrashId,Type,Road,Latitude,Longitude\n\
         1,A,Hwy,41.70,-72.60\n\
         2,A,Hwy,41.72,-72.61\n\
         3,A,Hwy,41.74,-72.62\n\
         4,B,Hwy,41.76,-72.63\n\
         5,B,Local,41.78,-72.64\n\
         6,B,Local,41.80,-72.65\n",
    );
    let mut acc = Accumulator::new();
    acc.merge(load_path(file.path(), None).unwrap()).unwrap();

    let pivot = build_pivot(acc.dataset(), &PivotRequest::new("Type", "Road")).unwrap();
    assert_eq!(pivot.count("A", "Hwy"), Some(3));
    assert_eq!(pivot.count("B", "Hwy"), Some(1));
    assert_eq!(pivot.count("B", "Local"), Some(2));
    assert_eq!(pivot.count("A", "Local"), Some(0));
    assert_eq!(pivot.row_total("A"), Some(3));
    assert_eq!(pivot.row_total("B"), Some(3));
    assert_eq!(pivot.column_total("Hwy"), Some(4));
    assert_eq!(pivot.column_total("Local"), Some(2));
    assert_eq!(pivot.grand_total(), Some(6));

    let summary = summarize(acc.dataset()).unwrap();
    assert_eq!(summary.points.len(), 6);
    assert!((summary.centroid.y() - 41.75).abs() < 1e-9);
}

#[test]
fn test_projection_drops_coordinates() {
    let file = export("CrashId,Type,Latitude,Longitude\n1,A,41.7,-72.6\n");
    let columns = vec!["Type".to_string(), "CrashId".to_string()];
    let batch = load_path(file.path(), Some(columns.as_slice())).unwrap();
    assert_eq!(batch.columns(), columns);
    assert_eq!(batch.rows()[0], vec![Some("A".to_string()), Some("1".to_string())]);

    let mut acc = Accumulator::new();
    acc.merge(batch).unwrap();
    assert!(matches!(
        summarize(acc.dataset()),
        Err(CrashDataError::MissingColumn(_))
    ));
}

#[test]
fn test_load_data_from_config() {
    let dir = tempdir().unwrap();
    let crashes = dir.path().join("crashes.csv");
    let conditions = dir.path().join("conditions.csv");
    std::fs::write(&crashes, "note\nCrashId,Type\n1,A\n2,B\n3,A\n").unwrap();
    std::fs::write(&conditions, "note\nCrashId,Weather\n3,Snow\n4,Rain\n").unwrap();

    let toml = format!(
        "[input]\nfiles = [{:?}, {:?}]\nmerge_strategy = \"union-by-key\"\n",
        crashes, conditions
    );
    let config = AppConfig::from_toml(&toml).unwrap();
    let acc = load_data(&config).unwrap();
    assert_eq!(acc.strategy(), MergeStrategy::UnionByKey);
    assert_eq!(acc.dataset().ids().collect::<Vec<_>>(), vec!["1", "2", "3", "4"]);
    assert_eq!(acc.dataset().get("3").unwrap().get("Weather"), Some("Snow"));
}

#[test]
fn test_load_data_reports_missing_file() {
    let missing = PathBuf::from("/nonexistent/crashes.csv");
    let toml = format!("[input]\nfiles = [{:?}]\n", missing);
    let config = AppConfig::from_toml(&toml).unwrap();
    let err = load_data(&config).unwrap_err();
    assert!(err.to_string().contains("Failed to load crash records"));
}
