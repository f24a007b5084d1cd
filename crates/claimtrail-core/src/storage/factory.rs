//! Backend selection for ledger and vault-log storage.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EncryptedFileStore, PlaintextFileStore, RecordStore, StorageError};
use crate::crypto::EnvelopeEncryptor;

/// Selects the on-disk representation of an append-only record log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One JSON object per line, readable on disk.
    #[default]
    PlaintextFile,

    /// One `base64(nonce || ciphertext)` line per record.
    EncryptedFile,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaintextFile => write!(f, "plaintext_file"),
            Self::EncryptedFile => write!(f, "encrypted_file"),
        }
    }
}

/// Constructs [`RecordStore`] implementations behind one contract, so
/// callers never branch on backend type.
pub struct StorageFactory;

impl StorageFactory {
    /// Opens a record store of the selected backend.
    ///
    /// For the encrypted backend, `key_path` is required; a missing key
    /// file is generated on first use. The plaintext backend ignores
    /// `key_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened, or if the
    /// encrypted backend is selected without a key path.
    pub fn open(
        backend: StorageBackend,
        path: &Path,
        key_path: Option<&Path>,
    ) -> Result<Box<dyn RecordStore>, StorageError> {
        match backend {
            StorageBackend::PlaintextFile => Ok(Box::new(PlaintextFileStore::open(path)?)),
            StorageBackend::EncryptedFile => {
                let key_path = key_path.ok_or(StorageError::MissingKeyPath)?;
                if !key_path.exists() {
                    EnvelopeEncryptor::write_key_file(key_path)?;
                }
                let encryptor = EnvelopeEncryptor::from_key_file(key_path)?;
                Ok(Box::new(EncryptedFileStore::open(path, encryptor)?))
            },
        }
    }
}
