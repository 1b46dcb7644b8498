//! Token vault: encrypted originals for reversible tokens
//!
//! `VaultStore` is the persistence abstraction every backend implements:
//! `put` rejects a token that already exists, `get` looks an entry up by
//! token. There is no lookup by plaintext.
//!
//! `Vault` pairs a store with the `VaultCipher`; it is the only place
//! originals are sealed and opened.

use crate::cipher::{associated_data, VaultCipher};
use crate::error::{Result, TokenizeError};
use crate::keys::SecretKey;
use crate::policy::TokenType;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod file;
pub mod memory;

pub use file::FileVaultStore;
pub use memory::MemoryVaultStore;

/// A persisted, encrypted original
///
/// Created once per reversible token and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    /// Token the original was replaced with (primary identity)
    pub token: String,

    /// Table the value came from
    pub source_table: String,

    /// Column the value came from
    pub column: String,

    /// Token type that produced the token
    pub token_type: TokenType,

    /// Base64-encoded AES-256-GCM ciphertext (with tag)
    pub encrypted_original: String,

    /// Base64-encoded 96-bit nonce
    pub nonce: String,

    /// When the entry was sealed
    pub created_at: DateTime<Utc>,

    /// Upload batch the token was minted for, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

/// Persistence backend for vault entries
pub trait VaultStore: Send + Sync {
    /// Persist a new entry atomically; `DuplicateToken` if the token exists
    fn put(&self, entry: VaultEntry) -> Result<()>;

    /// Fetch an entry by token; `NotFound` if absent
    fn get(&self, token: &str) -> Result<VaultEntry>;

    /// Number of stored entries
    fn len(&self) -> Result<usize>;

    /// Backend name (e.g., "memory", "file")
    fn name(&self) -> &str;

    fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }
}

/// Cipher + store: seals originals on the way in, opens them on demand
pub struct Vault {
    store: Arc<dyn VaultStore>,
    cipher: VaultCipher,
}

impl Vault {
    /// Create a vault over a store, encrypting with `key`
    pub fn new(store: impl VaultStore + 'static, key: &SecretKey) -> Self {
        Self::with_store(Arc::new(store), key)
    }

    /// Create a vault over a shared store
    pub fn with_store(store: Arc<dyn VaultStore>, key: &SecretKey) -> Self {
        Self {
            store,
            cipher: VaultCipher::new(key),
        }
    }

    /// Seal `plaintext` for `token` and commit it to the store
    ///
    /// Returns only after the store reports the entry durable.
    pub fn store_original(
        &self,
        source_table: &str,
        column: &str,
        token: &str,
        token_type: TokenType,
        plaintext: &str,
        batch_id: Option<&str>,
    ) -> Result<VaultEntry> {
        let ad = associated_data(source_table, column, token);
        let sealed = self.cipher.seal(plaintext.as_bytes(), &ad)?;

        let entry = VaultEntry {
            token: token.to_string(),
            source_table: source_table.to_string(),
            column: column.to_string(),
            token_type,
            encrypted_original: BASE64.encode(&sealed.ciphertext),
            nonce: BASE64.encode(sealed.nonce),
            created_at: Utc::now(),
            batch_id: batch_id.map(str::to_string),
        };

        self.store.put(entry.clone())?;
        tracing::debug!(
            store = self.store.name(),
            table = %source_table,
            column = %column,
            token = %token,
            "Vault entry committed"
        );
        Ok(entry)
    }

    /// Fetch an entry without decrypting it
    pub fn get(&self, token: &str) -> Result<VaultEntry> {
        self.store.get(token)
    }

    /// Look up a token and decrypt its original
    pub fn reveal(&self, token: &str) -> Result<String> {
        let entry = self.store.get(token)?;
        if entry.token != token {
            return Err(TokenizeError::AuthenticationFailure(token.to_string()));
        }
        self.open_entry(&entry)
    }

    /// Decrypt an entry; fails with `AuthenticationFailure` on any mismatch
    pub fn open_entry(&self, entry: &VaultEntry) -> Result<String> {
        let integrity = || TokenizeError::AuthenticationFailure(entry.token.clone());

        let ciphertext = BASE64
            .decode(&entry.encrypted_original)
            .map_err(|_| integrity())?;
        let nonce = BASE64.decode(&entry.nonce).map_err(|_| integrity())?;
        let ad = associated_data(&entry.source_table, &entry.column, &entry.token);

        let plaintext = self.cipher.open(&ciphertext, &nonce, &ad, &entry.token)?;
        String::from_utf8(plaintext).map_err(|_| integrity())
    }

    /// The underlying store
    pub fn store(&self) -> &dyn VaultStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("store", &self.store.name())
            .field("cipher", &self.cipher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> Vault {
        Vault::new(MemoryVaultStore::default(), &SecretKey::from_bytes([0x42; 32]))
    }

    #[test]
    fn test_store_and_reveal() {
        let vault = test_vault();
        let entry = vault
            .store_original("customers", "ssn", "tk_1", TokenType::Random, "123-45-6789", None)
            .unwrap();

        assert_eq!(entry.token, "tk_1");
        assert_ne!(entry.encrypted_original, "123-45-6789");
        assert_eq!(vault.reveal("tk_1").unwrap(), "123-45-6789");
        assert_eq!(vault.store().len().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_token_rejected_and_original_kept() {
        let vault = test_vault();
        vault
            .store_original("t", "c", "tk_1", TokenType::Random, "first", None)
            .unwrap();
        let err = vault
            .store_original("t", "c", "tk_1", TokenType::Random, "second", None)
            .unwrap_err();

        assert!(matches!(err, TokenizeError::DuplicateToken(ref t) if t == "tk_1"));
        assert_eq!(vault.reveal("tk_1").unwrap(), "first");
    }

    #[test]
    fn test_reveal_missing_token() {
        let err = test_vault().reveal("tk_missing").unwrap_err();
        assert!(matches!(err, TokenizeError::NotFound(_)));
    }

    #[test]
    fn test_relocated_entry_fails_authentication() {
        let vault = test_vault();
        let mut entry = vault
            .store_original("t", "ssn", "tk_1", TokenType::Random, "secret", None)
            .unwrap();

        entry.column = "email".to_string();
        assert!(vault.open_entry(&entry).unwrap_err().is_vault_integrity());

        entry.column = "ssn".to_string();
        entry.token = "tk_2".to_string();
        assert!(vault.open_entry(&entry).unwrap_err().is_vault_integrity());
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let store = Arc::new(MemoryVaultStore::default());
        let writer = Vault::with_store(store.clone(), &SecretKey::from_bytes([0x42; 32]));
        let reader = Vault::with_store(store, &SecretKey::from_bytes([0x7A; 32]));

        writer
            .store_original("t", "c", "tk_1", TokenType::Random, "secret", None)
            .unwrap();
        let err = reader.reveal("tk_1").unwrap_err();
        assert!(matches!(err, TokenizeError::AuthenticationFailure(_)));
    }

    #[test]
    fn test_corrupt_encoding_is_integrity_error() {
        let vault = test_vault();
        let mut entry = vault
            .store_original("t", "c", "tk_1", TokenType::Random, "secret", None)
            .unwrap();
        entry.nonce = "%%%".to_string();
        assert!(vault.open_entry(&entry).unwrap_err().is_vault_integrity());
    }

    #[test]
    fn test_entry_json_shape() {
        let vault = test_vault();
        let entry = vault
            .store_original("t", "c", "tk_1", TokenType::Random, "secret", Some("batch-1"))
            .unwrap();
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["token"], "tk_1");
        assert_eq!(json["sourceTable"], "t");
        assert_eq!(json["tokenType"], "RANDOM");
        assert_eq!(json["batchId"], "batch-1");
        assert!(json["encryptedOriginal"].is_string());
        assert!(json["nonce"].is_string());
    }
}
