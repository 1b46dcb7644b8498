//! Payloads exchanged with the ingestion and results services
//!
//! Only the data shapes live here. Transport belongs to the caller; the
//! field names follow the services' snake_case JSON.

use crate::error::{Result, TokenizeError};
use crate::types::{Record, RecordSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Batch status reported once results are available
pub const STATUS_PROCESSED: &str = "PROCESSED";

/// Description of a tokenized batch handed to the ingestion service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub client_id: String,
    pub processing_type: String,
    pub source_table: String,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
}

impl BatchManifest {
    /// Describe a tokenized record set
    pub fn new(
        client_id: impl Into<String>,
        processing_type: impl Into<String>,
        source_table: impl Into<String>,
        records: &RecordSet,
    ) -> Result<Self> {
        let manifest = Self {
            client_id: client_id.into(),
            processing_type: processing_type.into(),
            source_table: source_table.into(),
            record_count: records.len(),
            created_at: Utc::now(),
        };
        if manifest.client_id.trim().is_empty() {
            return Err(TokenizeError::Config("client_id must be non-empty".to_string()));
        }
        if manifest.processing_type.trim().is_empty() {
            return Err(TokenizeError::Config(
                "processing_type must be non-empty".to_string(),
            ));
        }
        Ok(manifest)
    }
}

/// The ingestion service's reply to an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReceipt {
    /// Identifier the service assigned to the batch
    pub batch_id: String,

    pub accepted_records: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl IngestionReceipt {
    /// Whether the service accepted every record the manifest announced
    pub fn accepted_all(&self, manifest: &BatchManifest) -> bool {
        self.accepted_records == manifest.record_count
    }
}

/// One processed record as returned by the results service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResult {
    /// Raw key value the result belongs to
    #[serde(default)]
    pub record_key: Option<String>,

    /// Result fields (e.g. `risk_score`, `model_version`)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A results payload for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResultBatch {
    pub batch_id: String,
    pub status: String,

    #[serde(default)]
    pub records: Vec<RemoteResult>,
}

impl RemoteResultBatch {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the service finished processing the batch
    pub fn is_processed(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_PROCESSED)
    }

    /// Convert into a result set keyed by `key_column`
    ///
    /// Columns are the key column followed by the union of result field
    /// names across all records, sorted by name.
    /// Null values become empty cells; non-string values keep their JSON
    /// text.
    pub fn into_result_set(self, key_column: &str) -> RecordSet {
        let names: BTreeSet<&String> = self
            .records
            .iter()
            .flat_map(|r| r.fields.keys())
            .filter(|name| name.as_str() != key_column)
            .collect();
        let mut columns = vec![key_column.to_string()];
        columns.extend(names.into_iter().cloned());

        let mut set = RecordSet::new(columns);
        for result in self.records {
            let mut record = Record::new().with(key_column, result.record_key.unwrap_or_default());
            for (name, value) in result.fields {
                if name != key_column {
                    record.set(name, cell(value));
                }
            }
            set.push(record);
        }
        set
    }
}

fn cell(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}
