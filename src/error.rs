//! Error types for a3s-tokenize

use thiserror::Error;

/// Errors that can occur while tokenizing, vaulting, or reintegrating records
#[derive(Debug, Error)]
pub enum TokenizeError {
    /// Invalid or incomplete configuration (policies, keys, schema)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A token type without a working generator was requested
    #[error("Token type {token_type} is not implemented (column '{column}')")]
    UnsupportedTokenType { token_type: String, column: String },

    /// Ciphertext did not authenticate (tampered data, wrong key, or relocated entry)
    #[error("Vault authentication failed for token '{0}'")]
    AuthenticationFailure(String),

    /// A vault entry already exists for this token
    #[error("Duplicate token in vault: {0}")]
    DuplicateToken(String),

    /// Token not present in the vault
    #[error("Token not found in vault: {0}")]
    NotFound(String),

    /// Reintegration inputs are unusable (missing key column, rejected duplicates)
    #[error("Merge input error: {0}")]
    MergeInput(String),

    /// Vault persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV read/write failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TokenizeError {
    /// Whether this error belongs to the configuration class (fatal, fix and re-run)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedTokenType { .. } | Self::Yaml(_)
        )
    }

    /// Whether this error signals a vault integrity violation
    pub fn is_vault_integrity(&self) -> bool {
        matches!(self, Self::AuthenticationFailure(_) | Self::DuplicateToken(_))
    }
}

/// Result type alias for tokenization operations
pub type Result<T> = std::result::Result<T, TokenizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(TokenizeError::Config("x".into()).is_configuration());
        assert!(TokenizeError::UnsupportedTokenType {
            token_type: "FPE".into(),
            column: "ssn".into(),
        }
        .is_configuration());
        assert!(!TokenizeError::NotFound("tk_1".into()).is_configuration());

        assert!(TokenizeError::AuthenticationFailure("tk_1".into()).is_vault_integrity());
        assert!(TokenizeError::DuplicateToken("tk_1".into()).is_vault_integrity());
        assert!(!TokenizeError::Storage("disk".into()).is_vault_integrity());
    }

    #[test]
    fn test_error_messages_name_the_column() {
        let err = TokenizeError::UnsupportedTokenType {
            token_type: "FPE".into(),
            column: "ssn".into(),
        };
        assert_eq!(
            err.to_string(),
            "Token type FPE is not implemented (column 'ssn')"
        );
    }
}
