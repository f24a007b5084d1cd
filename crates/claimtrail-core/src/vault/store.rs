//! Per-claim encrypted vault storage.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::{info, warn};

use super::entry::{PiiVaultEntry, PiiVaultIndex};
use crate::crypto::{CryptoError, KEY_SIZE};
use crate::storage::{RecordStore, StorageBackend, StorageError, StorageFactory, StoredLine};

/// File name of the vault's envelope key.
pub const KEY_FILE: &str = "vault.key";

/// File name of the vault's encrypted entry log.
pub const LOG_FILE: &str = "entries.log";

/// File name of the vault's plaintext index.
pub const INDEX_FILE: &str = "index.json";

/// Derives the deterministic vault id for a claim.
#[must_use]
pub fn vault_id_for_claim(claim_id: &str) -> String {
    format!("vault_{claim_id}")
}

/// Errors from vault operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    /// Operation on a vault that does not exist.
    #[error("vault not found: {vault_id}")]
    NotFound {
        /// The missing vault's id.
        vault_id: String,
    },

    /// Operation on a vault after crypto-shredding.
    #[error("vault has been shredded: {vault_id}")]
    Shredded {
        /// The shredded vault's id.
        vault_id: String,
    },

    /// An entry addressed to a different vault was offered for storage.
    #[error("entry belongs to vault {actual}, not {expected}")]
    WrongVault {
        /// The vault performing the store.
        expected: String,
        /// The vault named in the entry.
        actual: String,
    },

    /// The on-disk index does not describe this vault.
    #[error("vault index is corrupt: {reason}")]
    CorruptIndex {
        /// What was wrong with the index.
        reason: String,
    },

    /// Envelope encryption failure.
    #[error("vault crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage backend failure.
    #[error("vault storage error: {0}")]
    Storage(#[from] StorageError),

    /// Entry could not be serialized or deserialized.
    #[error("vault serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error on vault files.
    #[error("vault I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock poisoned by a panicked thread.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Encrypted PII storage scoped to one claim.
///
/// A vault is a directory holding three files: the envelope key, the
/// encrypted entry log, and the plaintext index. Values go in through
/// [`store`](Self::store) and come back out through
/// [`get`](Self::get)/[`get_batch`](Self::get_batch); destroying the key
/// via [`shred_vault`](Self::shred_vault) makes every logged ciphertext
/// permanently unrecoverable while the index keeps recording what was
/// shredded and why.
pub struct PiiVault {
    vault_id: String,
    claim_id: String,
    dir: PathBuf,
    key_path: PathBuf,
    index_path: PathBuf,
    store: Mutex<Option<Box<dyn RecordStore>>>,
    index: Mutex<PiiVaultIndex>,
}

impl PiiVault {
    /// Opens the vault for a claim, creating it on first use.
    ///
    /// First use creates the vault directory, generates and persists the
    /// envelope key, and writes an empty index.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault files cannot be created or read.
    pub fn create_or_open(root: &Path, claim_id: &str) -> Result<Self, VaultError> {
        let vault_id = vault_id_for_claim(claim_id);
        let dir = root.join(&vault_id);
        let index_path = dir.join(INDEX_FILE);

        let index = if index_path.exists() {
            read_index(&index_path, &vault_id)?
        } else {
            fs::create_dir_all(&dir)?;
            let index = PiiVaultIndex::new(&vault_id, claim_id);
            write_index_file(&index_path, &index)?;
            index
        };

        Self::assemble(vault_id, dir, index)
    }

    /// Opens an existing vault by id.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] if the vault directory or index
    /// does not exist.
    pub fn open_existing(root: &Path, vault_id: &str) -> Result<Self, VaultError> {
        let dir = root.join(vault_id);
        let index_path = dir.join(INDEX_FILE);
        if !index_path.exists() {
            return Err(VaultError::NotFound {
                vault_id: vault_id.to_string(),
            });
        }
        let index = read_index(&index_path, vault_id)?;
        Self::assemble(vault_id.to_string(), dir, index)
    }

    fn assemble(vault_id: String, dir: PathBuf, index: PiiVaultIndex) -> Result<Self, VaultError> {
        let key_path = dir.join(KEY_FILE);
        let log_path = dir.join(LOG_FILE);
        let index_path = dir.join(INDEX_FILE);
        let claim_id = index.claim_id.clone();

        // A missing key on a vault that already holds entries means the
        // key was destroyed (or lost); generating a replacement would
        // resurrect the vault with entries it can never decrypt.
        let store = if index.shredded {
            None
        } else if !key_path.exists() && !index.entries.is_empty() {
            warn!(%vault_id, "vault key file missing; treating vault as shredded");
            None
        } else {
            Some(StorageFactory::open(
                StorageBackend::EncryptedFile,
                &log_path,
                Some(&key_path),
            )?)
        };

        Ok(Self {
            vault_id,
            claim_id,
            dir,
            key_path,
            index_path,
            store: Mutex::new(store),
            index: Mutex::new(index),
        })
    }

    /// The vault's id.
    #[must_use]
    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    /// The claim the vault is scoped to.
    #[must_use]
    pub fn claim_id(&self) -> &str {
        &self.claim_id
    }

    /// The vault directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of live entries in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned.
    pub fn entry_count(&self) -> Result<usize, VaultError> {
        Ok(self.lock_index()?.entries.len())
    }

    /// True when the vault has been crypto-shredded (index marker) or
    /// its key file is absent.
    #[must_use]
    pub fn is_shredded(&self) -> bool {
        let marked = self.index.lock().map_or(true, |index| index.shredded);
        marked || !self.key_path.exists()
    }

    /// Stores a batch of entries.
    ///
    /// Each entry is encrypted and appended to the log; the index is
    /// rewritten once at the end of the batch. Appends are not rolled
    /// back when a later entry fails — the index reflects only entries
    /// that were recorded successfully, and callers should treat the
    /// operation as at-least-once.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Shredded`] after crypto-shredding, or the
    /// first append failure.
    pub fn store(&self, entries: &[PiiVaultEntry]) -> Result<usize, VaultError> {
        let guard = self.store.lock().map_err(|_| VaultError::LockPoisoned)?;
        let store = self.active_store(&guard)?;

        let mut recorded = Vec::new();
        let mut failure: Option<VaultError> = None;
        for entry in entries {
            if entry.vault_id != self.vault_id {
                failure = Some(VaultError::WrongVault {
                    expected: self.vault_id.clone(),
                    actual: entry.vault_id.clone(),
                });
                break;
            }
            let bytes = match serde_json::to_vec(entry) {
                Ok(bytes) => bytes,
                Err(err) => {
                    failure = Some(err.into());
                    break;
                },
            };
            if let Err(err) = store.append(&bytes) {
                failure = Some(err.into());
                break;
            }
            recorded.push((entry.entry_id.clone(), entry.meta()));
        }

        let recorded_count = recorded.len();
        {
            let mut index = self.lock_index()?;
            for (entry_id, meta) in recorded {
                index.entries.insert(entry_id, meta);
            }
            write_index_file(&self.index_path, &index)?;
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(recorded_count),
        }
    }

    /// Fetches one entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Shredded`] after crypto-shredding.
    pub fn get(&self, entry_id: &str) -> Result<Option<PiiVaultEntry>, VaultError> {
        let mut batch = self.get_batch(&[entry_id.to_string()])?;
        Ok(batch.remove(entry_id))
    }

    /// Fetches a batch of entries by id.
    ///
    /// Scans and decrypts the log in order, stopping once every
    /// requested id has been resolved. Ids absent from the index (for
    /// example after [`shred_entries`](Self::shred_entries)), unreadable
    /// log lines, and unknown ids are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Shredded`] after crypto-shredding.
    pub fn get_batch(
        &self,
        entry_ids: &[String],
    ) -> Result<HashMap<String, PiiVaultEntry>, VaultError> {
        let guard = self.store.lock().map_err(|_| VaultError::LockPoisoned)?;
        let store = self.active_store(&guard)?;

        // Only ids the index still lists are resolvable; ciphertext for
        // shredded entries stays in the log but is not discoverable.
        let wanted: HashSet<&str> = {
            let index = self.lock_index()?;
            entry_ids
                .iter()
                .map(String::as_str)
                .filter(|id| index.entries.contains_key(*id))
                .collect::<Vec<_>>()
                .into_iter()
                .collect()
        };

        let mut found = HashMap::new();
        if wanted.is_empty() {
            return Ok(found);
        }

        for line in store.load()? {
            match line {
                StoredLine::Readable { index, bytes } => {
                    match serde_json::from_slice::<PiiVaultEntry>(&bytes) {
                        Ok(entry) => {
                            if wanted.contains(entry.entry_id.as_str())
                                && !found.contains_key(&entry.entry_id)
                            {
                                found.insert(entry.entry_id.clone(), entry);
                                if found.len() == wanted.len() {
                                    break;
                                }
                            }
                        },
                        Err(_) => {
                            warn!(line = index, "skipping malformed vault entry");
                        },
                    }
                },
                StoredLine::Unreadable { index, reason } => {
                    warn!(line = index, %reason, "skipping unreadable vault entry");
                },
            }
        }
        Ok(found)
    }

    /// Fetches every live entry recorded for a document.
    ///
    /// Candidate ids are resolved from the index, then fetched through
    /// [`get_batch`](Self::get_batch).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Shredded`] after crypto-shredding.
    pub fn list_by_doc(&self, doc_id: &str) -> Result<Vec<PiiVaultEntry>, VaultError> {
        let candidate_ids: Vec<String> = {
            let index = self.lock_index()?;
            index
                .entries
                .iter()
                .filter(|(_, meta)| meta.doc_id.as_deref() == Some(doc_id))
                .map(|(id, _)| id.clone())
                .collect()
        };
        let mut batch = self.get_batch(&candidate_ids)?;
        // Return in index (id) order for determinism.
        Ok(candidate_ids
            .into_iter()
            .filter_map(|id| batch.remove(&id))
            .collect())
    }

    /// Crypto-shreds the vault.
    ///
    /// The index is marked shredded (with timestamp and reason) and
    /// written to disk *before* the key is destroyed, so the audit trail
    /// survives the destruction. The key file is then overwritten with
    /// random bytes and deleted. Idempotent: returns `false` when the
    /// given id does not match this vault or the vault is already
    /// shredded.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or key file cannot be written.
    pub fn shred_vault(&self, vault_id: &str, reason: &str) -> Result<bool, VaultError> {
        if vault_id != self.vault_id {
            warn!(
                requested = %vault_id,
                actual = %self.vault_id,
                "shred refused: vault id mismatch"
            );
            return Ok(false);
        }

        // Lock order is store-then-index everywhere in this type.
        let mut store_guard = self.store.lock().map_err(|_| VaultError::LockPoisoned)?;
        {
            let mut index = self.lock_index()?;
            if index.shredded || !self.key_path.exists() {
                return Ok(false);
            }
            index.shredded = true;
            index.shredded_at = Some(chrono::Utc::now());
            index.shred_reason = Some(reason.to_string());
            // The shred marker must be durable before the key goes away.
            write_index_file(&self.index_path, &index)?;
        }

        self.destroy_key()?;
        *store_guard = None;
        info!(vault_id = %self.vault_id, "vault crypto-shredded");
        Ok(true)
    }

    /// Removes entries from the index without touching the log.
    ///
    /// Ciphertext remains on disk but is no longer discoverable. This is
    /// weaker than [`shred_vault`](Self::shred_vault): the data is still
    /// recoverable by anyone holding the key and the raw log.
    ///
    /// Returns the number of entries actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Shredded`] after crypto-shredding.
    pub fn shred_entries(&self, entry_ids: &[String], reason: &str) -> Result<usize, VaultError> {
        if self.is_shredded() {
            return Err(VaultError::Shredded {
                vault_id: self.vault_id.clone(),
            });
        }

        let removed = {
            let mut index = self.lock_index()?;
            let before = index.entries.len();
            for entry_id in entry_ids {
                index.entries.remove(entry_id);
            }
            let removed = before - index.entries.len();
            if removed > 0 {
                write_index_file(&self.index_path, &index)?;
            }
            removed
        };

        if removed > 0 {
            info!(vault_id = %self.vault_id, removed, %reason, "vault entries shredded");
        }
        Ok(removed)
    }

    /// Borrows the active store, failing when the vault is shredded.
    fn active_store<'a>(
        &self,
        guard: &'a Option<Box<dyn RecordStore>>,
    ) -> Result<&'a dyn RecordStore, VaultError> {
        if self.is_shredded() {
            return Err(VaultError::Shredded {
                vault_id: self.vault_id.clone(),
            });
        }
        guard.as_deref().ok_or_else(|| VaultError::Shredded {
            vault_id: self.vault_id.clone(),
        })
    }

    fn lock_index(&self) -> Result<std::sync::MutexGuard<'_, PiiVaultIndex>, VaultError> {
        self.index.lock().map_err(|_| VaultError::LockPoisoned)
    }

    /// Overwrites the key file with random bytes, then deletes it.
    fn destroy_key(&self) -> Result<(), VaultError> {
        let len = fs::metadata(&self.key_path)?.len() as usize;
        let mut noise = vec![0u8; len.max(KEY_SIZE)];
        OsRng.fill_bytes(&mut noise);

        let mut file = OpenOptions::new().write(true).open(&self.key_path)?;
        file.write_all(&noise)?;
        file.sync_all()?;
        drop(file);

        fs::remove_file(&self.key_path)?;
        Ok(())
    }
}

fn read_index(index_path: &Path, expected_vault_id: &str) -> Result<PiiVaultIndex, VaultError> {
    let raw = fs::read_to_string(index_path)?;
    let index: PiiVaultIndex = serde_json::from_str(&raw)?;
    if index.vault_id != expected_vault_id {
        return Err(VaultError::CorruptIndex {
            reason: format!(
                "index names vault {}, expected {expected_vault_id}",
                index.vault_id
            ),
        });
    }
    Ok(index)
}

/// Rewrites the index atomically (write-temp-then-rename).
fn write_index_file(index_path: &Path, index: &PiiVaultIndex) -> Result<(), VaultError> {
    let serialized = serde_json::to_vec_pretty(index)?;
    let mut tmp = index_path.to_path_buf();
    tmp.set_extension("json.tmp");
    fs::write(&tmp, serialized)?;
    fs::rename(&tmp, index_path)?;
    Ok(())
}
