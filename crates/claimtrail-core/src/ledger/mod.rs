//! Hash-chained, append-only decision ledger.
//!
//! Every automated decision the pipeline makes is recorded here as an
//! immutable [`DecisionRecord`]. Records form a hash chain: each commits
//! to its own canonical serialization and to the digest of the record
//! before it, so editing or deleting any persisted line is detectable by
//! replaying the chain.
//!
//! # Append-only discipline
//!
//! There is no API to edit or delete a record. Lookups
//! ([`DecisionLedger::get_by_id`], [`DecisionLedger::query`]) are linear
//! scans over the log — write simplicity and tamper evidence are favored
//! over read locality, and this trade-off is deliberate.
//!
//! # Example
//!
//! ```rust,no_run
//! use claimtrail_core::ledger::{Actor, DecisionLedger, DecisionRecord, Rationale};
//! use claimtrail_core::storage::{StorageBackend, StorageFactory};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StorageFactory::open(
//!     StorageBackend::PlaintextFile,
//!     "audit/decisions.log".as_ref(),
//!     None,
//! )?;
//! let ledger = DecisionLedger::new(store);
//!
//! let record = DecisionRecord::classification(
//!     Rationale::new("matched invoice layout", 0.97),
//!     json!({"doc_type": "invoice"}),
//!     Actor::system("classifier"),
//! );
//! let appended = ledger.append(record)?;
//! assert!(appended.record_hash.is_some());
//!
//! let report = ledger.verify_integrity()?;
//! assert!(report.valid);
//! # Ok(())
//! # }
//! ```

mod record;
mod store;

#[cfg(test)]
mod tests;

pub use record::{
    canonical_record_bytes, new_decision_id, Actor, ActorType, DecisionRecord, DecisionType,
    EvidenceCitation, Rationale, RuleTrace,
};
pub use store::{
    DecisionLedger, IntegrityReport, IntegrityViolation, LedgerError, LedgerQuery, LedgerStats,
};
