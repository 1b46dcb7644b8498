//! CSV reading and writing for record sets
//!
//! The first row is the header. Rows shorter than the header leave the
//! trailing cells absent; absent cells are written as empty strings.

use crate::engine::{TokenizationEngine, TokenizeReport};
use crate::error::{Result, TokenizeError};
use crate::policy::PolicySet;
use crate::reintegrate::{MergeStats, ReintegrationEngine};
use crate::types::{Record, RecordSet};
use std::io::{Read, Write};
use std::path::Path;

/// Read a header-bearing CSV into a record set
pub fn read_csv<R: Read>(reader: R) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(TokenizeError::Config("CSV input has no header row".to_string()));
    }

    let mut set = RecordSet::new(headers.iter());
    for row in reader.records() {
        let row = row?;
        let record: Record = headers.iter().zip(row.iter()).collect();
        set.push(record);
    }
    Ok(set)
}

/// Read a CSV file into a record set
pub fn read_csv_path(path: impl AsRef<Path>) -> Result<RecordSet> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        TokenizeError::Storage(format!("Failed to open {}: {}", path.display(), e))
    })?;
    read_csv(file)
}

/// Write a record set as CSV in column order
pub fn write_csv<W: Write>(writer: W, records: &RecordSet) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&records.columns)?;
    for record in records.iter() {
        writer.write_record(records.columns.iter().map(|c| record.get(c).unwrap_or("")))?;
    }
    writer
        .flush()
        .map_err(|e| TokenizeError::Storage(format!("Failed to flush CSV output: {}", e)))
}

/// Write a record set to a CSV file, replacing any existing file
pub fn write_csv_path(path: impl AsRef<Path>, records: &RecordSet) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|e| {
        TokenizeError::Storage(format!("Failed to create {}: {}", path.display(), e))
    })?;
    write_csv(file, records)
}

/// Tokenize a CSV file into another CSV file
///
/// Only successfully tokenized records are written; the report carries
/// the failures.
pub async fn tokenize_file(
    engine: &TokenizationEngine,
    source_table: &str,
    policies: &PolicySet,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<TokenizeReport> {
    let records = read_csv_path(input)?;
    let report = engine.tokenize(source_table, &records, policies).await?;
    write_csv_path(output, &report.tokenized())?;
    Ok(report)
}

/// Merge results onto a raw CSV file and write the merged CSV
pub fn integrate_file(
    engine: &ReintegrationEngine,
    raw: impl AsRef<Path>,
    results: &RecordSet,
    output: impl AsRef<Path>,
) -> Result<MergeStats> {
    let raw = read_csv_path(raw)?;
    let merged = engine.integrate(&raw, results)?;
    write_csv_path(output, &merged.records)?;
    Ok(merged.stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv() {
        let data = "customer_id,email\n1,alice@example.com\n2,\n3\n";
        let set = read_csv(data.as_bytes()).unwrap();

        assert_eq!(set.columns, vec!["customer_id", "email"]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.records[0].get("email"), Some("alice@example.com"));
        assert_eq!(set.records[1].get("email"), Some(""));
        assert_eq!(set.records[2].get("email"), None);
    }

    #[test]
    fn test_empty_input_is_config_error() {
        let err = read_csv("".as_bytes()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_write_csv_in_column_order() {
        let mut set = RecordSet::new(["b", "a"]);
        set.push(Record::new().with("a", "1").with("b", "2"));
        set.push(Record::new().with("a", "x,y"));

        let mut out = Vec::new();
        write_csv(&mut out, &set).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "b,a\n2,1\n,\"x,y\"\n");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let set = RecordSet::from_rows(["id", "name"], vec![vec!["1", "Zoë"]]);

        write_csv_path(&path, &set).unwrap();
        assert_eq!(read_csv_path(&path).unwrap(), set);
    }

    #[test]
    fn test_missing_file() {
        let err = read_csv_path("/nonexistent/input.csv").unwrap_err();
        assert!(matches!(err, TokenizeError::Storage(_)));
    }
}
