//! Line-oriented append-only storage backends.
//!
//! The decision ledger and each vault's entry log share one storage
//! contract: records go in as opaque byte strings, one per line, and come
//! back in append order. Two backends implement it:
//!
//! - [`PlaintextFileStore`]: each record is written verbatim (the callers
//!   store newline-free JSON).
//! - [`EncryptedFileStore`]: each record is AES-GCM encrypted and
//!   base64-encoded before hitting disk.
//!
//! Reads never fail the whole file because of one bad line. A line that
//! cannot be decoded or authenticated is surfaced as
//! [`StoredLine::Unreadable`]; normal lookups skip it, while integrity
//! verification treats it as tamper evidence.
//!
//! Writers are serialized per store with an internal lock. Cross-process
//! coordination for a shared file is the caller's responsibility.

mod encrypted;
mod factory;
mod plaintext;

use std::path::Path;

use thiserror::Error;

pub use encrypted::EncryptedFileStore;
pub use factory::{StorageBackend, StorageFactory};
pub use plaintext::PlaintextFileStore;

use crate::crypto::CryptoError;

/// Maximum accepted length of a single stored line in bytes.
///
/// Bounds memory use when replaying a corrupted or hostile file. Well
/// within this limit for any legitimate record.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Errors from storage operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// I/O error on the backing file.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record exceeds [`MAX_LINE_LEN`].
    #[error("record too large: {len} bytes exceeds maximum of {max}")]
    RecordTooLarge {
        /// Size of the offending record.
        len: usize,
        /// The configured maximum.
        max: usize,
    },

    /// Record contains a raw newline and cannot be framed as one line.
    #[error("record contains a raw newline")]
    EmbeddedNewline,

    /// The encrypted backend was selected without a key file path.
    #[error("encrypted backend requires a key file path")]
    MissingKeyPath,

    /// Envelope encryption failure.
    #[error("storage crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Internal writer lock poisoned by a panicked thread.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// One line read back from a store, in append order.
#[derive(Debug, Clone)]
pub enum StoredLine {
    /// The line decoded (and, for the encrypted backend, authenticated).
    Readable {
        /// Zero-based position in the file.
        index: usize,
        /// The record bytes as originally appended.
        bytes: Vec<u8>,
    },

    /// The line could not be decoded or failed authentication.
    Unreadable {
        /// Zero-based position in the file.
        index: usize,
        /// Why the line was rejected. Never contains line content.
        reason: String,
    },
}

impl StoredLine {
    /// Zero-based position of this line in the file.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Readable { index, .. } | Self::Unreadable { index, .. } => *index,
        }
    }
}

/// Append-only record storage shared by the ledger and the vault log.
///
/// Implementations must preserve append order on load and must serialize
/// concurrent appends from multiple threads.
pub trait RecordStore: Send + Sync {
    /// Appends one record as a new line.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be framed or persisted.
    fn append(&self, record: &[u8]) -> Result<(), StorageError>;

    /// Loads every line in append order.
    ///
    /// Undecodable lines are returned as [`StoredLine::Unreadable`]
    /// rather than failing the load.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file itself cannot be read.
    fn load(&self) -> Result<Vec<StoredLine>, StorageError>;

    /// Path of the backing file.
    fn path(&self) -> &Path;
}
