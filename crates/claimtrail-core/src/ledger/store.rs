//! Hash-chained append-only decision store.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::record::{canonical_record_bytes, new_decision_id, DecisionRecord, DecisionType};
use crate::crypto::{digests_match, RecordHasher, GENESIS_HASH};
use crate::storage::{RecordStore, StorageError, StoredLine};

/// Errors from ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Storage backend failure.
    #[error("ledger storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record could not be serialized or deserialized.
    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal lock poisoned by a panicked thread.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// AND-combined filters for [`DecisionLedger::query`].
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    /// Match a specific decision type.
    pub decision_type: Option<DecisionType>,
    /// Match a specific claim.
    pub claim_id: Option<String>,
    /// Match a specific document.
    pub doc_id: Option<String>,
    /// Match a specific pipeline run.
    pub run_id: Option<String>,
    /// Match a specific actor id.
    pub actor_id: Option<String>,
}

impl LedgerQuery {
    /// An empty query matching every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by decision type (builder pattern).
    #[must_use]
    pub const fn with_decision_type(mut self, decision_type: DecisionType) -> Self {
        self.decision_type = Some(decision_type);
        self
    }

    /// Filters by claim id (builder pattern).
    #[must_use]
    pub fn with_claim_id(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = Some(claim_id.into());
        self
    }

    /// Filters by document id (builder pattern).
    #[must_use]
    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Filters by run id (builder pattern).
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Filters by actor id (builder pattern).
    #[must_use]
    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    fn matches(&self, record: &DecisionRecord) -> bool {
        if let Some(decision_type) = self.decision_type {
            if record.decision_type != decision_type {
                return false;
            }
        }
        if let Some(claim_id) = &self.claim_id {
            if record.claim_id.as_deref() != Some(claim_id.as_str()) {
                return false;
            }
        }
        if let Some(doc_id) = &self.doc_id {
            if record.doc_id.as_deref() != Some(doc_id.as_str()) {
                return false;
            }
        }
        if let Some(run_id) = &self.run_id {
            if record.run_id.as_deref() != Some(run_id.as_str()) {
                return false;
            }
        }
        if let Some(actor_id) = &self.actor_id {
            if record.actor.id != *actor_id {
                return false;
            }
        }
        true
    }
}

/// The first integrity violation found during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// Line could not be decoded or did not authenticate.
    UnreadableRecord,
    /// Line decoded but is not a well-formed hashed record.
    MalformedRecord,
    /// Recomputed record hash differs from the stored one.
    HashMismatch,
    /// `previous_hash` does not match the prior record's hash.
    ChainBroken,
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnreadableRecord => write!(f, "unreadable_record"),
            Self::MalformedRecord => write!(f, "malformed_record"),
            Self::HashMismatch => write!(f, "hash_mismatch"),
            Self::ChainBroken => write!(f, "chain_broken"),
        }
    }
}

/// Outcome of a full-ledger integrity verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// True when every record re-hashed and chained correctly.
    pub valid: bool,

    /// Total lines walked, including any past the first break.
    pub total_records: usize,

    /// Zero-based index of the first violation, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_at_index: Option<usize>,

    /// Kind of the first violation, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<IntegrityViolation>,
}

/// Summary statistics for a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    /// Number of readable records.
    pub total_records: usize,

    /// Hash of the most recent record, or the genesis sentinel.
    pub head_hash: String,
}

/// Append-only, hash-chained decision ledger.
///
/// Every appended record commits to the previous record's hash, so any
/// retroactive edit to a persisted record is detectable by
/// [`verify_integrity`](Self::verify_integrity). The backing store is
/// either plaintext or encrypted; the ledger never branches on which.
///
/// Appends are serialized through an internal lock that also caches the
/// chain head, so a sequence of appends scans the log once.
pub struct DecisionLedger {
    store: Box<dyn RecordStore>,
    head: Mutex<Option<String>>,
}

impl DecisionLedger {
    /// Creates a ledger over an opened record store.
    #[must_use]
    pub fn new(store: Box<dyn RecordStore>) -> Self {
        Self {
            store,
            head: Mutex::new(None),
        }
    }

    /// Appends a record, assigning its id and chain hashes.
    ///
    /// When `decision_id` is absent one is assigned. `previous_hash` is
    /// set to the current chain head and `record_hash` to the BLAKE3
    /// digest of the record's canonical serialization. Returns the fully
    /// populated record as persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or persisted.
    pub fn append(&self, mut record: DecisionRecord) -> Result<DecisionRecord, LedgerError> {
        let mut head = self.head.lock().map_err(|_| LedgerError::LockPoisoned)?;
        let previous = match head.as_ref() {
            Some(hash) => hash.clone(),
            None => self.scan_last_hash()?,
        };

        if record.decision_id.is_none() {
            record.decision_id = Some(new_decision_id());
        }
        record.previous_hash = Some(previous);
        record.record_hash = None;

        let mut value = serde_json::to_value(&record)?;
        let canonical = canonical_record_bytes(&value)?;
        let digest = RecordHasher::hash_canonical(&canonical);

        record.record_hash = Some(digest.clone());
        if let Some(object) = value.as_object_mut() {
            object.insert("record_hash".to_string(), Value::String(digest.clone()));
        }

        let line = serde_json::to_vec(&value)?;
        self.store.append(&line)?;
        *head = Some(digest);
        Ok(record)
    }

    /// Hash of the most recently appended record, or the genesis
    /// sentinel when the ledger is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn get_last_hash(&self) -> Result<String, LedgerError> {
        let mut head = self.head.lock().map_err(|_| LedgerError::LockPoisoned)?;
        if let Some(hash) = head.as_ref() {
            return Ok(hash.clone());
        }
        let scanned = self.scan_last_hash()?;
        *head = Some(scanned.clone());
        Ok(scanned)
    }

    /// Looks up a record by decision id.
    ///
    /// Returns `None` when no record matches or the matching line is
    /// unreadable (encrypted backend with the wrong key, tampered line).
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn get_by_id(&self, decision_id: &str) -> Result<Option<DecisionRecord>, LedgerError> {
        for record in self.readable_records()? {
            if record.decision_id.as_deref() == Some(decision_id) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Returns records matching every filter, in append order, capped
    /// at `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn query(
        &self,
        query: &LedgerQuery,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>, LedgerError> {
        let mut results = Vec::new();
        for record in self.readable_records()? {
            if query.matches(&record) {
                results.push(record);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Replays the full log, re-deriving every record hash and chain
    /// link.
    ///
    /// The walk continues past the first violation so `total_records`
    /// reflects the whole file, but only the first break is reported.
    /// Unreadable lines — skipped by normal reads — are hard failures
    /// here.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn verify_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let lines = self.store.load()?;
        let mut total = 0usize;
        let mut first_break: Option<(usize, IntegrityViolation)> = None;
        let mut expected_prev = GENESIS_HASH.to_string();

        for line in &lines {
            let index = total;
            total += 1;
            if first_break.is_some() {
                continue;
            }

            let bytes = match line {
                StoredLine::Unreadable { .. } => {
                    first_break = Some((index, IntegrityViolation::UnreadableRecord));
                    continue;
                },
                StoredLine::Readable { bytes, .. } => bytes,
            };

            let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
                first_break = Some((index, IntegrityViolation::MalformedRecord));
                continue;
            };
            let stored_hash = value.get("record_hash").and_then(Value::as_str);
            let stored_prev = value.get("previous_hash").and_then(Value::as_str);
            let (Some(stored_hash), Some(stored_prev)) = (stored_hash, stored_prev) else {
                first_break = Some((index, IntegrityViolation::MalformedRecord));
                continue;
            };

            if !digests_match(stored_prev, &expected_prev) {
                first_break = Some((index, IntegrityViolation::ChainBroken));
                continue;
            }

            let canonical = canonical_record_bytes(&value)?;
            let recomputed = RecordHasher::hash_canonical(&canonical);
            if !digests_match(&recomputed, stored_hash) {
                first_break = Some((index, IntegrityViolation::HashMismatch));
                continue;
            }

            expected_prev = stored_hash.to_string();
        }

        Ok(IntegrityReport {
            valid: first_break.is_none(),
            total_records: total,
            break_at_index: first_break.map(|(index, _)| index),
            error_type: first_break.map(|(_, violation)| violation),
        })
    }

    /// Record count and head hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let records = self.readable_records()?;
        let head_hash = records
            .last()
            .and_then(|r| r.record_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        Ok(LedgerStats {
            total_records: records.len(),
            head_hash,
        })
    }

    /// Parses every readable line into a record, warning on and
    /// skipping lines that fail to decode.
    fn readable_records(&self) -> Result<Vec<DecisionRecord>, LedgerError> {
        let mut records = Vec::new();
        for line in self.store.load()? {
            match line {
                StoredLine::Readable { index, bytes } => {
                    match serde_json::from_slice::<DecisionRecord>(&bytes) {
                        Ok(record) => records.push(record),
                        Err(_) => {
                            warn!(line = index, "skipping malformed ledger record");
                        },
                    }
                },
                StoredLine::Unreadable { index, reason } => {
                    warn!(line = index, %reason, "skipping unreadable ledger record");
                },
            }
        }
        Ok(records)
    }

    /// Scans the log for the hash of the last readable record.
    fn scan_last_hash(&self) -> Result<String, LedgerError> {
        let records = self.readable_records()?;
        Ok(records
            .last()
            .and_then(|r| r.record_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }
}
