//! Local reintegration of remote results onto raw records
//!
//! A hash index over the results is built once and then looked up with every
//! raw row, so the merge is linear in `raw + results`. The raw set defines
//! the output: every raw row appears exactly once, in input order.
//!
//! - raw rows sharing a key all receive the same result fields
//! - raw rows without a result pass through
//! - results without a raw row are ignored

use crate::error::{Result, TokenizeError};
use crate::types::{is_null_value, Record, RecordSet};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// What unmatched raw rows get for the result columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingResultPolicy {
    /// Row is emitted unchanged; result cells stay absent
    #[default]
    PassThrough,
    /// New result columns are set to the empty string
    FillEmpty,
}

/// How to treat several results carrying the same key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateResultPolicy {
    /// The later result replaces the earlier one
    #[default]
    LastWins,
    /// The first result is kept
    FirstWins,
    /// Duplicate result keys fail the merge
    Reject,
}

/// Counts for one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    /// Raw rows that received result fields
    pub matched: usize,

    /// Raw rows passed through without a result
    pub unmatched: usize,

    /// Results whose key matched no raw row
    pub ignored_results: usize,

    /// Results dropped because another result had the same key
    pub duplicate_results: usize,
}

/// Merged records plus merge statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub records: RecordSet,
    pub stats: MergeStats,
}

/// Join `results` onto `raw` by `key_column`
///
/// Fails before touching any row when the key column is missing from
/// either schema.
pub fn integrate(
    raw: &RecordSet,
    key_column: &str,
    results: &RecordSet,
    missing: MissingResultPolicy,
    duplicate: DuplicateResultPolicy,
) -> Result<MergeOutput> {
    if !raw.has_column(key_column) {
        return Err(TokenizeError::MergeInput(format!(
            "Key column '{}' not found in raw records (columns: {:?})",
            key_column, raw.columns
        )));
    }
    if !results.has_column(key_column) {
        return Err(TokenizeError::MergeInput(format!(
            "Key column '{}' not found in results (columns: {:?})",
            key_column, results.columns
        )));
    }

    let result_columns: Vec<&String> = results
        .columns
        .iter()
        .filter(|c| c.as_str() != key_column)
        .collect();

    let mut columns = raw.columns.clone();
    let new_columns: Vec<&String> = result_columns
        .iter()
        .copied()
        .filter(|c| !raw.has_column(c))
        .collect();
    columns.extend(new_columns.iter().map(|c| (*c).clone()));

    let mut stats = MergeStats::default();

    // build
    let mut index: HashMap<&str, &Record> = HashMap::with_capacity(results.len());
    for result in results.iter() {
        let Some(key) = result.get(key_column).filter(|k| !is_null_value(k)) else {
            stats.ignored_results += 1;
            continue;
        };
        match index.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
            Entry::Occupied(mut slot) => match duplicate {
                DuplicateResultPolicy::Reject => {
                    return Err(TokenizeError::MergeInput(format!(
                        "Duplicate result key '{}' in column '{}'",
                        key, key_column
                    )));
                }
                DuplicateResultPolicy::LastWins => {
                    slot.insert(result);
                    stats.duplicate_results += 1;
                }
                DuplicateResultPolicy::FirstWins => stats.duplicate_results += 1,
            },
        }
    }

    // lookup
    let mut merged = RecordSet::new(columns);
    let mut raw_keys: HashSet<&str> = HashSet::with_capacity(raw.len());
    for row in raw.iter() {
        let mut out = row.clone();
        let hit = row.get(key_column).and_then(|key| {
            raw_keys.insert(key);
            index.get(key)
        });

        match hit {
            Some(result) => {
                for column in &result_columns {
                    if let Some(value) = result.get(column) {
                        out.set(column.as_str(), value);
                    }
                }
                stats.matched += 1;
            }
            None => {
                if missing == MissingResultPolicy::FillEmpty {
                    for column in &new_columns {
                        out.set(column.as_str(), "");
                    }
                }
                stats.unmatched += 1;
            }
        }
        merged.push(out);
    }

    stats.ignored_results += index.keys().filter(|k| !raw_keys.contains(*k)).count();

    tracing::info!(
        key_column = %key_column,
        raw = raw.len(),
        results = results.len(),
        matched = stats.matched,
        unmatched = stats.unmatched,
        ignored = stats.ignored_results,
        "Reintegration complete"
    );

    Ok(MergeOutput {
        records: merged,
        stats,
    })
}

/// Reintegration with fixed key column and policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReintegrationEngine {
    pub key_column: String,

    #[serde(default)]
    pub missing: MissingResultPolicy,

    #[serde(default)]
    pub duplicate: DuplicateResultPolicy,
}

impl ReintegrationEngine {
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            missing: MissingResultPolicy::default(),
            duplicate: DuplicateResultPolicy::default(),
        }
    }

    pub fn with_missing_policy(mut self, missing: MissingResultPolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn with_duplicate_policy(mut self, duplicate: DuplicateResultPolicy) -> Self {
        self.duplicate = duplicate;
        self
    }

    /// Merge `results` onto `raw`
    pub fn integrate(&self, raw: &RecordSet, results: &RecordSet) -> Result<MergeOutput> {
        integrate(raw, &self.key_column, results, self.missing, self.duplicate)
    }
}
