//! In-memory vault store for testing and single-process use
//!
//! Entries are lost on drop.

use super::{VaultEntry, VaultStore};
use crate::error::{Result, TokenizeError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

/// Vault store backed by a `HashMap` behind an `RwLock`
#[derive(Default)]
pub struct MemoryVaultStore {
    entries: RwLock<HashMap<String, VaultEntry>>,
}

impl VaultStore for MemoryVaultStore {
    fn put(&self, entry: VaultEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(|e| {
            TokenizeError::Storage(format!("Failed to acquire vault lock: {}", e))
        })?;

        match entries.entry(entry.token.clone()) {
            Entry::Occupied(_) => Err(TokenizeError::DuplicateToken(entry.token)),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    fn get(&self, token: &str) -> Result<VaultEntry> {
        let entries = self.entries.read().map_err(|e| {
            TokenizeError::Storage(format!("Failed to acquire vault lock: {}", e))
        })?;
        entries
            .get(token)
            .cloned()
            .ok_or_else(|| TokenizeError::NotFound(token.to_string()))
    }

    fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|e| {
            TokenizeError::Storage(format!("Failed to acquire vault lock: {}", e))
        })?;
        Ok(entries.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
