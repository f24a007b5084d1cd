//! Encrypted newline-delimited storage backend.
//!
//! Each record is envelope-encrypted and base64-encoded before being
//! appended, so the file remains a readable line-per-record log while the
//! payloads stay opaque. Decoding or authentication failures on load are
//! reported per line, never as a whole-file error.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::plaintext::{check_frame, write_line};
use super::{RecordStore, StorageError, StoredLine, MAX_LINE_LEN};
use crate::crypto::EnvelopeEncryptor;

/// Append-only store writing `base64(nonce || ciphertext)` lines.
pub struct EncryptedFileStore {
    path: PathBuf,
    encryptor: EnvelopeEncryptor,
    writer: Mutex<File>,
}

impl EncryptedFileStore {
    /// Opens (or creates) the backing file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be
    /// created.
    pub fn open(
        path: impl AsRef<Path>,
        encryptor: EnvelopeEncryptor,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            encryptor,
            writer: Mutex::new(file),
        })
    }
}

impl RecordStore for EncryptedFileStore {
    fn append(&self, record: &[u8]) -> Result<(), StorageError> {
        check_frame(record)?;
        let ciphertext = self.encryptor.encrypt(record)?;
        let line = BASE64.encode(ciphertext);
        let mut file = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        write_line(&mut file, line.as_bytes())
    }

    fn load(&self) -> Result<Vec<StoredLine>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let mut lines = Vec::new();
        for (index, raw) in content.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            if raw.len() > MAX_LINE_LEN {
                lines.push(StoredLine::Unreadable {
                    index,
                    reason: "line exceeds maximum length".to_string(),
                });
                continue;
            }
            let Ok(ciphertext) = BASE64.decode(raw.trim()) else {
                lines.push(StoredLine::Unreadable {
                    index,
                    reason: "invalid base64".to_string(),
                });
                continue;
            };
            match self.encryptor.decrypt(&ciphertext) {
                Ok(bytes) => lines.push(StoredLine::Readable { index, bytes }),
                Err(_) => lines.push(StoredLine::Unreadable {
                    index,
                    reason: "ciphertext did not authenticate".to_string(),
                }),
            }
        }
        Ok(lines)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
