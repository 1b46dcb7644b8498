//! # a3s-tokenize
//!
//! Local tokenization, encrypted token vault, and result reintegration for
//! privacy-preserving data pipelines in the A3S ecosystem.
//!
//! ## Overview
//!
//! Raw records never leave the data owner. `a3s-tokenize` replaces PII
//! columns with tokens before a batch is uploaded, keeps the originals of
//! reversible tokens in a local encrypted vault, and joins the analytics
//! results that come back onto the raw records by a declared key column.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_tokenize::{
//!     KeyMaterial, MemoryVaultStore, PolicySet, RecordSet, SecretKey, TokenPolicy,
//!     TokenRule, TokenType, TokenizationEngine,
//! };
//!
//! # async fn example() -> a3s_tokenize::Result<()> {
//! let keys = KeyMaterial {
//!     vault_key: SecretKey::from_bytes([7; 32]),
//!     hash_key: SecretKey::from_bytes([9; 32]),
//! };
//! let engine = TokenizationEngine::from_keys(&keys, Arc::new(MemoryVaultStore::default()));
//!
//! let mut policies = PolicySet::new();
//! policies.insert(TokenPolicy::new("customers", "email", TokenRule::of(TokenType::Hash)))?;
//!
//! let records = RecordSet::from_rows(
//!     ["customer_id", "email"],
//!     vec![vec!["1", "alice@example.com"]],
//! );
//! let report = engine.tokenize("customers", &records, &policies).await?;
//! assert!(report.is_complete());
//! # Ok(())
//! # }
//! ```
//!
//! ## Token types
//!
//! - **HASH**: keyed HMAC-SHA256 digest; deterministic, never vaulted
//! - **MASKED**: shape-preserving mask; deterministic, never vaulted
//! - **RANDOM**: random identifier; original sealed in the vault
//! - **FPE**: not implemented; rejected as a configuration error
//!
//! ## Architecture
//!
//! - **TokenGenerator**: per-field token generation, one arm per token type
//! - **VaultCipher**: AES-256-GCM sealing bound to (table, column, token)
//! - **VaultStore** trait: persistence abstraction (memory, file)
//! - **TokenizationEngine**: parallel record-set tokenization with per-record outcomes
//! - **ReintegrationEngine**: hash-index join of results onto raw records

pub mod batch;
pub mod cipher;
pub mod config;
pub mod csv_io;
pub mod engine;
pub mod error;
pub mod generator;
pub mod keys;
pub mod mask;
pub mod policy;
pub mod reintegrate;
pub mod types;
pub mod vault;

// Re-export core types
pub use batch::{BatchManifest, IngestionReceipt, RemoteResult, RemoteResultBatch};
pub use cipher::VaultCipher;
pub use config::{PipelineConfig, VaultBackend};
pub use engine::{RecordFailure, RecordOutcome, TokenizationEngine, TokenizeReport, TokenizeSummary};
pub use error::{Result, TokenizeError};
pub use generator::{GeneratedToken, Generation, TokenGenerator};
pub use keys::{KeyMaterial, SecretKey};
pub use policy::{MaskShape, PolicyDocument, PolicySet, TokenPolicy, TokenRule, TokenType};
pub use reintegrate::{
    integrate, DuplicateResultPolicy, MergeOutput, MergeStats, MissingResultPolicy,
    ReintegrationEngine,
};
pub use types::{Record, RecordSet};
pub use vault::{Vault, VaultEntry, VaultStore};

// Re-export stores for convenience
pub use vault::{FileVaultStore, MemoryVaultStore};

// Cancellation handle accepted by `TokenizationEngine::tokenize_with_cancel`
pub use tokio_util::sync::CancellationToken;
