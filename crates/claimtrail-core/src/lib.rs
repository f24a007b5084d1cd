//! Compliance and audit core for the claimtrail document pipeline.
//!
//! Two tightly coupled primitives share one cryptographic foundation:
//!
//! - **Decision ledger** ([`ledger`]): a hash-chained, append-only
//!   record of every automated decision the pipeline makes. Any
//!   retroactive edit to a persisted record is detectable by replaying
//!   the chain.
//! - **PII vault** ([`vault`]): per-claim encrypted storage for
//!   personally identifiable values, with crypto-shredding — destroying
//!   a vault's key renders its ciphertext permanently unrecoverable —
//!   for right-to-erasure compliance.
//!
//! The [`tokenizer`] sits between them and the rest of the system: it
//! classifies extracted fields as PII and swaps the real values for
//! `[PII:<vault_id>:<entry_id>]` tokens, so protected data exists only
//! inside a vault's encrypted log. [`storage`] provides the shared
//! plaintext/encrypted append-only backends, and [`service`] wires
//! everything into one explicitly injected context.
//!
//! # Example
//!
//! ```rust,no_run
//! use claimtrail_core::config::AuditConfig;
//! use claimtrail_core::ledger::{Actor, DecisionRecord, Rationale};
//! use claimtrail_core::service::AuditService;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuditConfig::from_toml(
//!     r#"
//!     [storage]
//!     root = "audit"
//!
//!     [ledger]
//!     backend = "encrypted_file"
//!     "#,
//! )?;
//! let audit = AuditService::new(&config)?;
//!
//! audit.record_decision(
//!     DecisionRecord::quality_gate(
//!         Rationale::new("all extracted fields above threshold", 0.98),
//!         json!({"passed": true}),
//!         Actor::system("quality-gate"),
//!     )
//!     .with_claim_id("CLM001"),
//! )?;
//!
//! let report = audit.verify_ledger()?;
//! assert!(report.valid);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod service;
pub mod storage;
pub mod tokenizer;
pub mod vault;

pub use config::AuditConfig;
pub use service::{AuditError, AuditService};
