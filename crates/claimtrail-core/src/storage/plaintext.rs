//! Plaintext newline-delimited storage backend.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{RecordStore, StorageError, StoredLine, MAX_LINE_LEN};

/// Append-only store writing each record verbatim as one line.
pub struct PlaintextFileStore {
    path: PathBuf,
    writer: Mutex<File>,
}

impl PlaintextFileStore {
    /// Opens (or creates) the backing file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }
}

/// Validates that a record can be framed as a single line.
pub(super) fn check_frame(record: &[u8]) -> Result<(), StorageError> {
    if record.len() > MAX_LINE_LEN {
        return Err(StorageError::RecordTooLarge {
            len: record.len(),
            max: MAX_LINE_LEN,
        });
    }
    if record.contains(&b'\n') {
        return Err(StorageError::EmbeddedNewline);
    }
    Ok(())
}

/// Writes one framed line and flushes it to disk.
pub(super) fn write_line(file: &mut File, line: &[u8]) -> Result<(), StorageError> {
    file.write_all(line)?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

impl RecordStore for PlaintextFileStore {
    fn append(&self, record: &[u8]) -> Result<(), StorageError> {
        check_frame(record)?;
        let mut file = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        write_line(&mut file, record)
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
            } else {
                lines.push(StoredLine::Readable {
                    index,
                    bytes: raw.as_bytes().to_vec(),
                });
            }
        }
        Ok(lines)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
