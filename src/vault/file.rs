//! File-backed vault store
//!
//! One JSON file per entry, grouped by scope:
//!
//! ```text
//! <root>/
//!   <source_table>/
//!     <column>/
//!       <hex(token)>.json
//! ```
//!
//! Each entry is written to a temp file, fsynced, then renamed into place,
//! so a crash never leaves a half-written entry under its final name. The
//! containing directory (and any scope directory created for the entry) is
//! synced before `put` returns, so a committed rename survives power loss.
//! Writes are serialized through a single writer lock; reads only touch
//! the token index and the entry file.

use super::{VaultEntry, VaultStore};
use crate::error::{Result, TokenizeError};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

const ENTRY_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

/// Durable vault store rooted at a directory
pub struct FileVaultStore {
    root: PathBuf,

    /// token → entry file
    index: RwLock<HashMap<String, PathBuf>>,

    /// Single-writer guard for the put path
    writer: Mutex<()>,
}

impl FileVaultStore {
    /// Open (or create) a vault directory and index its entries
    ///
    /// Temp files left behind by an interrupted write are removed; they
    /// were never committed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            TokenizeError::Storage(format!(
                "Failed to create vault directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let mut index = HashMap::new();
        let mut stale = 0usize;
        for table_dir in read_dirs(&root)? {
            for column_dir in read_dirs(&table_dir)? {
                for path in read_files(&column_dir)? {
                    match path.extension().and_then(|e| e.to_str()) {
                        Some(ENTRY_EXT) => match token_from_path(&path) {
                            Some(token) => {
                                index.insert(token, path);
                            }
                            None => tracing::warn!(
                                path = %path.display(),
                                "Skipping vault file with undecodable name"
                            ),
                        },
                        Some(TMP_EXT) => {
                            if let Err(e) = fs::remove_file(&path) {
                                tracing::warn!(
                                    path = %path.display(),
                                    error = %e,
                                    "Failed to remove uncommitted vault file"
                                );
                            }
                            stale += 1;
                        }
                        _ => {}
                    }
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            entries = index.len(),
            discarded = stale,
            "Vault opened"
        );

        Ok(Self {
            root,
            index: RwLock::new(index),
            writer: Mutex::new(()),
        })
    }

    /// Vault root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, entry: &VaultEntry) -> PathBuf {
        self.root
            .join(scope_name(&entry.source_table))
            .join(scope_name(&entry.column))
            .join(format!("{}.{}", hex::encode(&entry.token), ENTRY_EXT))
    }

    fn write_entry(&self, path: &Path, entry: &VaultEntry) -> Result<()> {
        let json = serde_json::to_vec_pretty(entry)?;

        let parent = path.parent().unwrap_or(&self.root);
        let created = self.create_scope_dirs(parent)?;

        let tmp_path = path.with_extension(TMP_EXT);
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp_path);
            return Err(TokenizeError::Storage(format!(
                "Failed to write vault entry {}: {}",
                tmp_path.display(),
                e
            )));
        }

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            TokenizeError::Storage(format!(
                "Failed to rename vault entry {} → {}: {}",
                tmp_path.display(),
                path.display(),
                e
            ))
        })?;

        // the rename is durable only once its directory is synced; new
        // scope directories need their own parents synced as well
        sync_dir(parent)?;
        for dir in created {
            if let Some(up) = dir.parent() {
                sync_dir(up)?;
            }
        }
        Ok(())
    }

    /// Create missing directories between the root and `dir`
    ///
    /// Returns the directories that did not exist before, deepest first.
    fn create_scope_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.exists() || d == self.root.as_path() {
                break;
            }
            created.push(d.to_path_buf());
            current = d.parent();
        }

        fs::create_dir_all(dir).map_err(|e| {
            TokenizeError::Storage(format!(
                "Failed to create vault directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(created)
    }
}

impl VaultStore for FileVaultStore {
    fn put(&self, entry: VaultEntry) -> Result<()> {
        let _guard = self.writer.lock().map_err(|e| {
            TokenizeError::Storage(format!("Failed to acquire vault writer lock: {}", e))
        })?;

        let exists = {
            let index = self.index.read().map_err(|e| {
                TokenizeError::Storage(format!("Failed to acquire vault index lock: {}", e))
            })?;
            index.contains_key(&entry.token)
        };
        let path = self.entry_path(&entry);
        if exists || path.exists() {
            return Err(TokenizeError::DuplicateToken(entry.token));
        }

        self.write_entry(&path, &entry)?;

        let mut index = self.index.write().map_err(|e| {
            TokenizeError::Storage(format!("Failed to acquire vault index lock: {}", e))
        })?;
        index.insert(entry.token, path);
        Ok(())
    }

    fn get(&self, token: &str) -> Result<VaultEntry> {
        let path = {
            let index = self.index.read().map_err(|e| {
                TokenizeError::Storage(format!("Failed to acquire vault index lock: {}", e))
            })?;
            index
                .get(token)
                .cloned()
                .ok_or_else(|| TokenizeError::NotFound(token.to_string()))?
        };

        let bytes = fs::read(&path).map_err(|e| {
            TokenizeError::Storage(format!(
                "Failed to read vault entry {}: {}",
                path.display(),
                e
            ))
        })?;
        let entry: VaultEntry = serde_json::from_slice(&bytes).map_err(|e| {
            TokenizeError::Storage(format!(
                "Failed to parse vault entry {}: {}",
                path.display(),
                e
            ))
        })?;

        if entry.token != token {
            return Err(TokenizeError::AuthenticationFailure(token.to_string()));
        }
        Ok(entry)
    }

    fn len(&self) -> Result<usize> {
        let index = self.index.read().map_err(|e| {
            TokenizeError::Storage(format!("Failed to acquire vault index lock: {}", e))
        })?;
        Ok(index.len())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Directory-safe scope name; anything outside `[A-Za-z0-9_-]` becomes `_`
fn scope_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

/// Flush a directory's entries to disk
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| {
            TokenizeError::Storage(format!(
                "Failed to sync vault directory {}: {}",
                dir.display(),
                e
            ))
        })
}

// directory handles cannot be opened for syncing outside unix
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn token_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

fn read_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

fn read_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list(dir)?.into_iter().filter(|p| p.is_file()).collect())
}

fn list(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        TokenizeError::Storage(format!("Failed to read vault directory {}: {}", dir.display(), e))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            TokenizeError::Storage(format!("Failed to read vault directory {}: {}", dir.display(), e))
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}
