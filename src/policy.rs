//! Token policies and their resolution per (table, column)
//!
//! A policy document mirrors the pipeline's YAML configuration:
//!
//! ```yaml
//! source_table: customers
//! key_column: customer_id
//! default: HASH
//! passthrough: [customer_id]
//! columns:
//!   email: HASH
//!   phone: { token_type: MASKED, shape: phone }
//!   ssn: { token_type: RANDOM }
//! ```
//!
//! Resolution order for a field: explicit column rule, then the table's
//! default rule (unless the column is listed under `passthrough`), then
//! pass-through.

use crate::error::{Result, TokenizeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

/// Default number of hex characters kept from a HASH digest
pub const DEFAULT_HASH_LENGTH: usize = 24;

/// Smallest allowed HASH token length (hex characters)
pub const MIN_HASH_LENGTH: usize = 16;

/// Largest allowed HASH token length (full HMAC-SHA256 in hex)
pub const MAX_HASH_LENGTH: usize = 64;

/// Token type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    Hash,
    Masked,
    Random,
    Fpe,
}

impl TokenType {
    /// Whether tokens of this type keep a recoverable original in the vault
    pub fn is_reversible(&self) -> bool {
        matches!(self, Self::Random | Self::Fpe)
    }

    /// Whether identical plaintext always maps to the identical token
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Hash | Self::Masked | Self::Fpe)
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash => write!(f, "HASH"),
            Self::Masked => write!(f, "MASKED"),
            Self::Random => write!(f, "RANDOM"),
            Self::Fpe => write!(f, "FPE"),
        }
    }
}

impl FromStr for TokenType {
    type Err = TokenizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HASH" => Ok(Self::Hash),
            "MASKED" => Ok(Self::Masked),
            "RANDOM" => Ok(Self::Random),
            "FPE" => Ok(Self::Fpe),
            other => Err(TokenizeError::Config(format!(
                "Unsupported token_type: {}",
                other
            ))),
        }
    }
}

/// Shape rule for MASKED tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskShape {
    /// Pick email, phone, or generic masking from the value itself
    #[default]
    Auto,
    /// Keep the first character of the local part and the domain
    Email,
    /// Keep the last four digits
    Phone,
    /// Keep the first and last characters
    Generic,
    /// Keep the last `count` characters, mask the rest in place
    KeepLast { count: usize },
}

/// Token rule: one variant per token type, carrying its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "token_type", rename_all = "UPPERCASE")]
pub enum TokenRule {
    /// Keyed deterministic digest
    #[serde(alias = "hash")]
    Hash {
        /// Per-policy salt mixed into the keyed digest
        #[serde(default, skip_serializing_if = "Option::is_none")]
        salt: Option<String>,

        /// Hex characters kept from the digest
        #[serde(default = "default_hash_length")]
        length: usize,
    },

    /// Shape-preserving irreversible mask
    #[serde(alias = "masked")]
    Masked {
        #[serde(default)]
        shape: MaskShape,

        #[serde(default = "default_mask_char")]
        mask_char: char,
    },

    /// Random identifier, original kept encrypted in the vault
    #[serde(alias = "random")]
    Random,

    /// Format-preserving encryption (not implemented)
    #[serde(alias = "fpe")]
    Fpe,
}

fn default_hash_length() -> usize {
    DEFAULT_HASH_LENGTH
}

fn default_mask_char() -> char {
    '*'
}

impl TokenRule {
    /// Default rule for a token type
    pub fn of(token_type: TokenType) -> Self {
        match token_type {
            TokenType::Hash => Self::Hash {
                salt: None,
                length: DEFAULT_HASH_LENGTH,
            },
            TokenType::Masked => Self::Masked {
                shape: MaskShape::Auto,
                mask_char: default_mask_char(),
            },
            TokenType::Random => Self::Random,
            TokenType::Fpe => Self::Fpe,
        }
    }

    /// The token type this rule produces
    pub fn token_type(&self) -> TokenType {
        match self {
            Self::Hash { .. } => TokenType::Hash,
            Self::Masked { .. } => TokenType::Masked,
            Self::Random => TokenType::Random,
            Self::Fpe => TokenType::Fpe,
        }
    }

    /// Validate rule parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Hash { length, .. } => {
                if !(MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(length) {
                    return Err(TokenizeError::Config(format!(
                        "HASH length must be between {} and {}, got {}",
                        MIN_HASH_LENGTH, MAX_HASH_LENGTH, length
                    )));
                }
            }
            Self::Masked { mask_char, shape } => {
                if mask_char.is_alphanumeric() {
                    return Err(TokenizeError::Config(format!(
                        "Mask character must not be alphanumeric, got '{}'",
                        mask_char
                    )));
                }
                if let MaskShape::KeepLast { count: 0 } = shape {
                    return Err(TokenizeError::Config(
                        "keep_last count must be at least 1".to_string(),
                    ));
                }
            }
            Self::Random | Self::Fpe => {}
        }
        Ok(())
    }
}

/// A resolved per-field rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPolicy {
    /// Table the column belongs to
    pub source_table: String,

    /// Column name
    pub column: String,

    /// Token type and parameters
    pub rule: TokenRule,
}

impl TokenPolicy {
    pub fn new(source_table: impl Into<String>, column: impl Into<String>, rule: TokenRule) -> Self {
        Self {
            source_table: source_table.into(),
            column: column.into(),
            rule,
        }
    }

    pub fn token_type(&self) -> TokenType {
        self.rule.token_type()
    }
}

/// Column entry in a policy document: a bare type name or a full rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Short(String),
    Full(TokenRule),
}

impl ColumnSpec {
    fn into_rule(self) -> Result<TokenRule> {
        match self {
            Self::Short(name) => Ok(TokenRule::of(name.parse()?)),
            Self::Full(rule) => Ok(rule),
        }
    }
}

/// One table's policy configuration as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub source_table: String,

    /// Join key that must stay joinable (untokenized or HASH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,

    /// Rule applied to columns without an explicit entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnSpec>,

    /// Columns exempt from the default rule
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough: Vec<String>,

    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSpec>,
}

impl PolicyDocument {
    /// Parse a single policy document from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[derive(Debug, Clone, Default)]
struct TableDefaults {
    rule: Option<TokenRule>,
    passthrough: HashSet<String>,
    key_column: Option<String>,
}

/// All policies known to a tokenization run
///
/// Enforces at most one policy per (table, column).
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: HashMap<(String, String), TokenPolicy>,
    tables: HashMap<String, TableDefaults>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parsed documents
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a PolicyDocument>) -> Result<Self> {
        let mut set = Self::new();
        for doc in docs {
            set.add_document(doc.clone())?;
        }
        Ok(set)
    }

    /// Add an explicit column policy
    pub fn insert(&mut self, policy: TokenPolicy) -> Result<()> {
        if policy.source_table.trim().is_empty() || policy.column.trim().is_empty() {
            return Err(TokenizeError::Config(
                "Policy source_table and column must be non-empty".to_string(),
            ));
        }
        policy.rule.validate()?;

        let key = (policy.source_table.clone(), policy.column.clone());
        if self.policies.contains_key(&key) {
            return Err(TokenizeError::Config(format!(
                "Duplicate policy for {}.{}",
                key.0, key.1
            )));
        }
        self.tables.entry(key.0.clone()).or_default();
        self.policies.insert(key, policy);
        Ok(())
    }

    /// Configure the default rule for a table
    pub fn set_default(&mut self, source_table: impl Into<String>, rule: TokenRule) -> Result<()> {
        rule.validate()?;
        self.tables.entry(source_table.into()).or_default().rule = Some(rule);
        Ok(())
    }

    /// Exempt a column from the table default
    pub fn add_passthrough(&mut self, source_table: impl Into<String>, column: impl Into<String>) {
        self.tables
            .entry(source_table.into())
            .or_default()
            .passthrough
            .insert(column.into());
    }

    /// Declare the join key column for a table
    pub fn set_key_column(&mut self, source_table: impl Into<String>, column: impl Into<String>) {
        self.tables.entry(source_table.into()).or_default().key_column = Some(column.into());
    }

    /// Merge one document into the set
    pub fn add_document(&mut self, doc: PolicyDocument) -> Result<()> {
        let table = doc.source_table.trim().to_string();
        if table.is_empty() {
            return Err(TokenizeError::Config(
                "Policy document missing 'source_table'".to_string(),
            ));
        }

        for (column, spec) in doc.columns {
            let rule = spec.into_rule().map_err(|e| {
                TokenizeError::Config(format!("Column '{}': {}", column, e))
            })?;
            self.insert(TokenPolicy::new(&table, column, rule))?;
        }
        if let Some(default) = doc.default {
            self.set_default(&table, default.into_rule()?)?;
        }
        for column in doc.passthrough {
            self.add_passthrough(&table, column);
        }
        if let Some(key) = doc.key_column {
            self.set_key_column(&table, key);
        }
        self.tables.entry(table).or_default();
        Ok(())
    }

    /// Resolve the policy for a field, or `None` for pass-through
    pub fn resolve(&self, source_table: &str, column: &str) -> Option<TokenPolicy> {
        if let Some(policy) = self
            .policies
            .get(&(source_table.to_string(), column.to_string()))
        {
            return Some(policy.clone());
        }

        let defaults = self.tables.get(source_table)?;
        if defaults.passthrough.contains(column) {
            return None;
        }
        let rule = defaults.rule.as_ref()?;
        // a non-HASH default never touches the join key
        if defaults.key_column.as_deref() == Some(column) && rule.token_type() != TokenType::Hash {
            return None;
        }
        Some(TokenPolicy::new(source_table, column, rule.clone()))
    }

    /// Explicitly configured columns for a table
    pub fn explicit_columns(&self, source_table: &str) -> Vec<&str> {
        let mut columns: Vec<&str> = self
            .policies
            .keys()
            .filter(|(t, _)| t == source_table)
            .map(|(_, c)| c.as_str())
            .collect();
        columns.sort_unstable();
        columns
    }

    /// Declared join key for a table
    pub fn key_column(&self, source_table: &str) -> Option<&str> {
        self.tables
            .get(source_table)
            .and_then(|t| t.key_column.as_deref())
    }

    /// Check that a table's key column can still be joined on
    ///
    /// The key must either pass through or be tokenized deterministically
    /// with HASH; anything else breaks reintegration.
    pub fn validate_key_column(&self, source_table: &str) -> Result<()> {
        let Some(key) = self.key_column(source_table) else {
            return Ok(());
        };
        match self.resolve(source_table, key) {
            None => Ok(()),
            Some(policy) if policy.token_type() == TokenType::Hash => Ok(()),
            Some(policy) => Err(TokenizeError::Config(format!(
                "Key column '{}' of table '{}' uses {} tokens; it must be untokenized or HASH",
                key,
                source_table,
                policy.token_type()
            ))),
        }
    }

    /// Number of explicit column policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.tables.values().all(|t| t.rule.is_none())
    }
}
