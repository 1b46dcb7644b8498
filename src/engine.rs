//! Tokenization engine
//!
//! Runs a whole record set through policy resolution, token generation and
//! the vault. Configuration problems fail the call before any record is
//! touched; everything after that is reported per record.
//!
//! Records are split into contiguous chunks and processed on the tokio
//! blocking pool, at most `workers` chunks at a time. Outcomes come back in
//! input order regardless of which chunk finishes first.

use crate::error::{Result, TokenizeError};
use crate::generator::{Generation, TokenGenerator};
use crate::keys::KeyMaterial;
use crate::policy::{PolicySet, TokenPolicy, TokenType};
use crate::types::{Record, RecordSet};
use crate::vault::{Vault, VaultEntry, VaultStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Why one record could not be tokenized
#[derive(Debug)]
pub struct RecordFailure {
    /// Column whose field failed
    pub column: String,

    /// Underlying error
    pub error: TokenizeError,

    /// Entries this record committed before the failing field
    ///
    /// They stay in the vault; their tokens were never emitted.
    pub committed: Vec<VaultEntry>,
}

/// Per-record result of a tokenization run
#[derive(Debug)]
pub enum RecordOutcome {
    /// Every field was tokenized or passed through; vault writes committed
    Tokenized {
        index: usize,
        record: Record,
        vault_entries: Vec<VaultEntry>,
    },
    /// A field failed; the record is withheld from the output
    Failed { index: usize, failure: RecordFailure },
    /// The run was cancelled before this record started
    Cancelled { index: usize },
}

impl RecordOutcome {
    /// Position of the record in the input set
    pub fn index(&self) -> usize {
        match self {
            Self::Tokenized { index, .. } | Self::Failed { index, .. } | Self::Cancelled { index } => {
                *index
            }
        }
    }

    pub fn is_tokenized(&self) -> bool {
        matches!(self, Self::Tokenized { .. })
    }
}

/// Counts for a tokenization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizeSummary {
    pub total: usize,
    pub tokenized: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub vaulted: usize,
}

/// Result of tokenizing a record set
#[derive(Debug)]
pub struct TokenizeReport {
    /// Table the records came from
    pub source_table: String,

    /// Output schema (same as the input schema)
    pub columns: Vec<String>,

    /// One outcome per input record, in input order
    pub outcomes: Vec<RecordOutcome>,
}

impl TokenizeReport {
    /// Successfully tokenized records, in input order
    pub fn tokenized(&self) -> RecordSet {
        let mut set = RecordSet::new(self.columns.iter().cloned());
        for outcome in &self.outcomes {
            if let RecordOutcome::Tokenized { record, .. } = outcome {
                set.push(record.clone());
            }
        }
        set
    }

    /// Every vault entry committed during the run
    ///
    /// Includes entries written by records that later failed.
    pub fn vault_entries(&self) -> Vec<&VaultEntry> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                RecordOutcome::Tokenized { vault_entries, .. } => vault_entries.as_slice(),
                RecordOutcome::Failed { failure, .. } => failure.committed.as_slice(),
                RecordOutcome::Cancelled { .. } => &[][..],
            })
            .collect()
    }

    /// Failed records with their reasons
    pub fn failures(&self) -> impl Iterator<Item = (usize, &RecordFailure)> {
        self.outcomes.iter().filter_map(|o| match o {
            RecordOutcome::Failed { index, failure } => Some((*index, failure)),
            _ => None,
        })
    }

    /// Input indices of records that failed
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures().map(|(i, _)| i).collect()
    }

    /// Input indices of records never started because of cancellation
    ///
    /// Feed these to `RecordSet::subset` to resume the run.
    pub fn remaining_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RecordOutcome::Cancelled { index } => Some(*index),
                _ => None,
            })
            .collect()
    }

    /// Whether every record was tokenized
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(RecordOutcome::is_tokenized)
    }

    pub fn summary(&self) -> TokenizeSummary {
        let mut summary = TokenizeSummary {
            total: self.outcomes.len(),
            ..Default::default()
        };
        for outcome in &self.outcomes {
            match outcome {
                RecordOutcome::Tokenized { vault_entries, .. } => {
                    summary.tokenized += 1;
                    summary.vaulted += vault_entries.len();
                }
                RecordOutcome::Failed { failure, .. } => {
                    summary.failed += 1;
                    summary.vaulted += failure.committed.len();
                }
                RecordOutcome::Cancelled { .. } => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Split into the tokenized record set and every committed vault entry
    pub fn into_parts(self) -> (RecordSet, Vec<VaultEntry>) {
        let mut set = RecordSet::new(self.columns);
        let mut entries = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                RecordOutcome::Tokenized {
                    record,
                    vault_entries,
                    ..
                } => {
                    set.push(record);
                    entries.extend(vault_entries);
                }
                RecordOutcome::Failed { failure, .. } => entries.extend(failure.committed),
                RecordOutcome::Cancelled { .. } => {}
            }
        }
        (set, entries)
    }
}

/// Resolved rule for one output column
type ColumnPlan = Vec<(String, Option<TokenPolicy>)>;

struct EngineInner {
    generator: TokenGenerator,
    vault: Arc<Vault>,
}

impl EngineInner {
    fn tokenize_record(
        &self,
        source_table: &str,
        index: usize,
        record: &Record,
        plan: &ColumnPlan,
        batch_id: Option<&str>,
    ) -> RecordOutcome {
        let mut out = Record::new();
        let mut vault_entries = Vec::new();

        for (column, policy) in plan {
            let Some(value) = record.get(column) else {
                continue;
            };
            let Some(policy) = policy else {
                out.set(column, value);
                continue;
            };

            let field = self.tokenize_field(source_table, column, policy, value, batch_id);
            match field {
                Ok((token, entry)) => {
                    vault_entries.extend(entry);
                    out.set(column, token);
                }
                Err(error) => {
                    return RecordOutcome::Failed {
                        index,
                        failure: RecordFailure {
                            column: column.clone(),
                            error,
                            committed: vault_entries,
                        },
                    };
                }
            }
        }

        RecordOutcome::Tokenized {
            index,
            record: out,
            vault_entries,
        }
    }

    /// Output cell for one field, plus its vault entry when reversible
    fn tokenize_field(
        &self,
        source_table: &str,
        column: &str,
        policy: &TokenPolicy,
        value: &str,
        batch_id: Option<&str>,
    ) -> Result<(String, Option<VaultEntry>)> {
        match self.generator.generate(&policy.rule, value) {
            Generation::PassThrough => Ok((value.to_string(), None)),
            Generation::Unimplemented(token_type) => Err(TokenizeError::UnsupportedTokenType {
                token_type: token_type.to_string(),
                column: column.to_string(),
            }),
            Generation::Token(generated) => {
                let Some(payload) = generated.vault_payload.as_deref() else {
                    return Ok((generated.token, None));
                };
                // commit before the token can reach the output
                let entry = self.vault.store_original(
                    source_table,
                    column,
                    &generated.token,
                    policy.token_type(),
                    payload,
                    batch_id,
                )?;
                Ok((generated.token, Some(entry)))
            }
        }
    }
}

/// Tokenizes record sets against a policy set
///
/// Key material and the vault are held explicitly, so several engines
/// with different keys or vaults can coexist in one process.
pub struct TokenizationEngine {
    inner: Arc<EngineInner>,
    workers: usize,
    batch_id: Option<String>,
}

impl TokenizationEngine {
    /// Create an engine from a generator and a vault
    pub fn new(generator: TokenGenerator, vault: Arc<Vault>) -> Self {
        Self {
            inner: Arc::new(EngineInner { generator, vault }),
            workers: default_workers(),
            batch_id: None,
        }
    }

    /// Create an engine from key material and a vault store
    pub fn from_keys(keys: &KeyMaterial, store: Arc<dyn VaultStore>) -> Self {
        let vault = Vault::with_store(store, &keys.vault_key);
        Self::new(TokenGenerator::new(keys.hash_key.clone()), Arc::new(vault))
    }

    /// Bound the number of concurrently processed chunks
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Stamp vault entries with an upload batch id
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    /// The vault this engine writes to
    pub fn vault(&self) -> &Vault {
        &self.inner.vault
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Check configuration against the record set and resolve every column
    ///
    /// Fails on: unknown explicit columns, a non-joinable key column,
    /// duplicate header names, or a column resolving to an unimplemented
    /// token type.
    pub fn preflight(
        &self,
        source_table: &str,
        records: &RecordSet,
        policies: &PolicySet,
    ) -> Result<Vec<(String, Option<TokenPolicy>)>> {
        if source_table.trim().is_empty() {
            return Err(TokenizeError::Config("source_table must be non-empty".to_string()));
        }

        let mut seen = HashSet::new();
        for column in &records.columns {
            if !seen.insert(column.as_str()) {
                return Err(TokenizeError::Config(format!(
                    "Duplicate column '{}' in record set",
                    column
                )));
            }
        }

        for column in policies.explicit_columns(source_table) {
            if !records.has_column(column) {
                return Err(TokenizeError::Config(format!(
                    "Configured column '{}' not found in record set columns: {:?}",
                    column, records.columns
                )));
            }
        }

        policies.validate_key_column(source_table)?;

        let mut plan = Vec::with_capacity(records.columns.len());
        for column in &records.columns {
            let policy = policies.resolve(source_table, column);
            if let Some(p) = &policy {
                if p.token_type() == TokenType::Fpe {
                    return Err(TokenizeError::UnsupportedTokenType {
                        token_type: p.token_type().to_string(),
                        column: column.clone(),
                    });
                }
            }
            plan.push((column.clone(), policy));
        }
        Ok(plan)
    }

    /// Tokenize a record set
    pub async fn tokenize(
        &self,
        source_table: &str,
        records: &RecordSet,
        policies: &PolicySet,
    ) -> Result<TokenizeReport> {
        self.tokenize_with_cancel(source_table, records, policies, &CancellationToken::new())
            .await
    }

    /// Tokenize a record set, stopping early when `cancel` fires
    ///
    /// Records already committed stay valid; records not yet started are
    /// reported as `Cancelled` and can be resubmitted.
    pub async fn tokenize_with_cancel(
        &self,
        source_table: &str,
        records: &RecordSet,
        policies: &PolicySet,
        cancel: &CancellationToken,
    ) -> Result<TokenizeReport> {
        let plan = Arc::new(self.preflight(source_table, records, policies)?);
        let total = records.len();

        tracing::info!(
            table = %source_table,
            records = total,
            columns = records.columns.len(),
            tokenized_columns = plan.iter().filter(|(_, p)| p.is_some()).count(),
            workers = self.workers,
            "Tokenization started"
        );

        let chunk_size = total.div_ceil(self.workers).max(1);
        let mut tasks = JoinSet::new();
        for (chunk_index, chunk) in records.records.chunks(chunk_size).enumerate() {
            let rows = chunk.to_vec();
            let offset = chunk_index * chunk_size;
            let inner = self.inner.clone();
            let plan = plan.clone();
            let table = source_table.to_string();
            let batch_id = self.batch_id.clone();
            let cancel = cancel.clone();

            tasks.spawn_blocking(move || {
                let outcomes: Vec<RecordOutcome> = rows
                    .iter()
                    .enumerate()
                    .map(|(i, record)| {
                        let index = offset + i;
                        if cancel.is_cancelled() {
                            RecordOutcome::Cancelled { index }
                        } else {
                            inner.tokenize_record(&table, index, record, &plan, batch_id.as_deref())
                        }
                    })
                    .collect();
                (chunk_index, outcomes)
            });
        }

        let mut chunks = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let chunk = joined.map_err(|e| TokenizeError::Worker(e.to_string()))?;
            chunks.push(chunk);
        }
        chunks.sort_by_key(|(chunk_index, _)| *chunk_index);
        let outcomes: Vec<RecordOutcome> = chunks.into_iter().flat_map(|(_, o)| o).collect();

        let report = TokenizeReport {
            source_table: source_table.to_string(),
            columns: records.columns.clone(),
            outcomes,
        };

        for (index, failure) in report.failures() {
            tracing::warn!(
                table = %source_table,
                record = index,
                column = %failure.column,
                error = %failure.error,
                committed = failure.committed.len(),
                "Record tokenization failed"
            );
        }

        let summary = report.summary();
        tracing::info!(
            table = %source_table,
            total = summary.total,
            tokenized = summary.tokenized,
            failed = summary.failed,
            cancelled = summary.cancelled,
            vaulted = summary.vaulted,
            "Tokenization finished"
        );

        Ok(report)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
