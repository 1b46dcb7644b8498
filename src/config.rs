//! Pipeline configuration
//!
//! ```yaml
//! vault:
//!   backend: file
//!   path: ./token_vault
//! keys:
//!   vault_key_env: SDP_CRYPTO_KEY
//!   hash_key_env: SDP_HASH_KEY
//! workers: 4
//! reintegration:
//!   key_column: customer_id
//!   missing: pass_through
//! policies:
//!   - source_table: customers
//!     key_column: customer_id
//!     columns:
//!       email: HASH
//!       ssn: { token_type: RANDOM }
//! ```
//!
//! Key bytes never appear in the file; only the names of the environment
//! variables holding them.

use crate::engine::TokenizationEngine;
use crate::error::{Result, TokenizeError};
use crate::keys::{KeyMaterial, DEFAULT_HASH_KEY_ENV, DEFAULT_VAULT_KEY_ENV};
use crate::policy::{PolicyDocument, PolicySet};
use crate::reintegrate::ReintegrationEngine;
use crate::vault::{FileVaultStore, MemoryVaultStore, VaultStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default directory of the file vault
pub const DEFAULT_VAULT_PATH: &str = "token_vault";

/// Vault persistence backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub backend: VaultBackend,

    #[serde(default = "default_vault_path")]
    pub path: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: VaultBackend::default(),
            path: default_vault_path(),
        }
    }
}

fn default_vault_path() -> PathBuf {
    PathBuf::from(DEFAULT_VAULT_PATH)
}

/// Names of the environment variables carrying key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_vault_key_env")]
    pub vault_key_env: String,

    #[serde(default = "default_hash_key_env")]
    pub hash_key_env: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            vault_key_env: default_vault_key_env(),
            hash_key_env: default_hash_key_env(),
        }
    }
}

fn default_vault_key_env() -> String {
    DEFAULT_VAULT_KEY_ENV.to_string()
}

fn default_hash_key_env() -> String {
    DEFAULT_HASH_KEY_ENV.to_string()
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub keys: KeyConfig,

    /// Concurrent tokenization workers (default: available cores)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Join settings for merging results back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reintegration: Option<ReintegrationEngine>,

    #[serde(default)]
    pub policies: Vec<PolicyDocument>,
}

impl PipelineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TokenizeError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(TokenizeError::Config("workers must be at least 1".to_string()));
        }
        if self.keys.vault_key_env.trim().is_empty() || self.keys.hash_key_env.trim().is_empty() {
            return Err(TokenizeError::Config(
                "Key environment variable names must be non-empty".to_string(),
            ));
        }
        if self.vault.backend == VaultBackend::File && self.vault.path.as_os_str().is_empty() {
            return Err(TokenizeError::Config("vault.path must be set for the file backend".to_string()));
        }
        if let Some(reintegration) = &self.reintegration {
            if reintegration.key_column.trim().is_empty() {
                return Err(TokenizeError::Config(
                    "reintegration.key_column must be non-empty".to_string(),
                ));
            }
        }

        let policies = self.policy_set()?;
        for doc in &self.policies {
            policies.validate_key_column(doc.source_table.trim())?;
        }
        Ok(())
    }

    /// Build the policy set from every document
    pub fn policy_set(&self) -> Result<PolicySet> {
        PolicySet::from_documents(&self.policies)
    }

    /// Read key material from the configured environment variables
    pub fn key_material(&self) -> Result<KeyMaterial> {
        KeyMaterial::from_env(&self.keys.vault_key_env, &self.keys.hash_key_env)
    }

    /// Open the configured vault store
    pub fn open_vault_store(&self) -> Result<Arc<dyn VaultStore>> {
        let store: Arc<dyn VaultStore> = match self.vault.backend {
            VaultBackend::File => Arc::new(FileVaultStore::open(&self.vault.path)?),
            VaultBackend::Memory => Arc::new(MemoryVaultStore::default()),
        };
        tracing::info!(backend = store.name(), "Vault store opened");
        Ok(store)
    }

    /// Build a tokenization engine with explicit key material
    pub fn build_engine(&self, keys: &KeyMaterial) -> Result<TokenizationEngine> {
        let engine = TokenizationEngine::from_keys(keys, self.open_vault_store()?);
        Ok(match self.workers {
            Some(workers) => engine.with_workers(workers),
            None => engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SecretKey;
    use crate::policy::TokenType;

    const CONFIG: &str = r#"
vault:
  backend: memory
workers: 2
reintegration:
  key_column: customer_id
  duplicate: first_wins
policies:
  - source_table: customers
    key_column: customer_id
    columns:
      email: HASH
      ssn:
        token_type: RANDOM
"#;

    #[test]
    fn test_parse_config() {
        let config = PipelineConfig::from_yaml_str(CONFIG).unwrap();
        assert_eq!(config.vault.backend, VaultBackend::Memory);
        assert_eq!(config.vault.path, PathBuf::from(DEFAULT_VAULT_PATH));
        assert_eq!(config.keys.vault_key_env, "SDP_CRYPTO_KEY");
        assert_eq!(config.keys.hash_key_env, "SDP_HASH_KEY");
        assert_eq!(config.workers, Some(2));

        let reintegration = config.reintegration.as_ref().unwrap();
        assert_eq!(reintegration.key_column, "customer_id");
        assert_eq!(
            reintegration.duplicate,
            crate::reintegrate::DuplicateResultPolicy::FirstWins
        );

        let policies = config.policy_set().unwrap();
        assert_eq!(
            policies.resolve("customers", "ssn").unwrap().token_type(),
            TokenType::Random
        );
        assert_eq!(policies.key_column("customers"), Some("customer_id"));
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.vault.backend, VaultBackend::File);
        assert!(config.policies.is_empty());
        assert!(config.workers.is_none());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = PipelineConfig::from_yaml_str("workers: 0").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_random_key_column_rejected() {
        let yaml = r#"
policies:
  - source_table: customers
    key_column: customer_id
    columns:
      customer_id: RANDOM
"#;
        let err = PipelineConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("customer_id"));
    }

    #[test]
    fn test_duplicate_policy_across_documents_rejected() {
        let yaml = r#"
policies:
  - source_table: customers
    columns:
      email: HASH
  - source_table: customers
    columns:
      email: MASKED
"#;
        let err = PipelineConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("customers.email"));
    }

    #[test]
    fn test_malformed_yaml_is_configuration_error() {
        let err = PipelineConfig::from_yaml_str("vault: [").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_file_and_file_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault_dir = dir.path().join("vault");
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, format!("vault:\n  path: {}\nworkers: 3\n", vault_dir.display()))
            .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        let keys = KeyMaterial {
            vault_key: SecretKey::from_bytes([1; 32]),
            hash_key: SecretKey::from_bytes([2; 32]),
        };
        let engine = config.build_engine(&keys).unwrap();
        assert_eq!(engine.workers(), 3);
        assert_eq!(engine.vault().store().name(), "file");
        assert!(vault_dir.exists());
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/pipeline.yaml")).unwrap_err();
        assert!(err.is_configuration());
    }
}
