//! Core record types
//!
//! Records are ordered collections of named textual cells. A missing cell
//! and an empty cell are both treated as a null Field Value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single row: column name → cell value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell assignment
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    /// Get a cell; `None` when the column is absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Set a cell, replacing any previous value
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Whether the cell is absent or empty
    pub fn is_null(&self, column: &str) -> bool {
        self.get(column).map_or(true, is_null_value)
    }

    /// Number of populated cells
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no cells
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An ordered record set with a declared column schema
///
/// Row order is significant and preserved by every transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    /// Column names in output order
    pub columns: Vec<String>,

    /// Rows in input order
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Create an empty record set with the given schema
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    /// Build a record set from positional rows matching `columns`
    ///
    /// Short rows leave the trailing columns absent.
    pub fn from_rows<I, S, R, V>(columns: I, rows: R) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut set = Self::new(columns);
        for row in rows {
            let record = set
                .columns
                .iter()
                .cloned()
                .zip(row.into_iter().map(Into::into))
                .collect::<Record>();
            set.records.push(record);
        }
        set
    }

    /// Append a row
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Whether the schema declares `column`
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate rows in order
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// A new set with the same schema holding only the rows at `indices`
    ///
    /// Out-of-range indices are skipped. Used to re-run a batch on the
    /// records a previous run did not finish.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            records: indices
                .iter()
                .filter_map(|&i| self.records.get(i).cloned())
                .collect(),
        }
    }
}

/// Null test for Field Values
///
/// Only the empty string is null; whitespace is a value like any other.
pub(crate) fn is_null_value(value: &str) -> bool {
    value.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_get_set() {
        let mut record = Record::new().with("id", "1");
        record.set("name", "Alice");
        assert_eq!(record.get("id"), Some("1"));
        assert_eq!(record.get("name"), Some("Alice"));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_record_null_semantics() {
        let record = Record::new().with("a", "").with("b", "  ").with("c", "x");
        assert!(record.is_null("a"));
        assert!(!record.is_null("b"));
        assert!(!record.is_null("c"));
        assert!(record.is_null("absent"));
    }

    #[test]
    fn test_from_rows_preserves_order() {
        let set = RecordSet::from_rows(
            ["id", "name"],
            vec![vec!["1", "A"], vec!["2", "B"], vec!["3"]],
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.records[0].get("name"), Some("A"));
        assert_eq!(set.records[1].get("id"), Some("2"));
        assert_eq!(set.records[2].get("name"), None);
        assert!(set.has_column("name"));
        assert!(!set.has_column("email"));
    }

    #[test]
    fn test_subset() {
        let set = RecordSet::from_rows(["id"], vec![vec!["1"], vec!["2"], vec!["3"]]);
        let sub = set.subset(&[2, 0, 9]);
        assert_eq!(sub.columns, vec!["id"]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.records[0].get("id"), Some("3"));
        assert_eq!(sub.records[1].get("id"), Some("1"));
    }

    #[test]
    fn test_record_json_is_flat_object() {
        let record = Record::new().with("id", "1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"id": "1"}));
    }
}
