//! Vault entry and index models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index document schema version.
pub const INDEX_SCHEMA_VERSION: u8 = 1;

/// One protected value, owned exclusively by its vault.
///
/// The `original_value` is the payload the vault exists to protect; it
/// only ever appears inside the vault's encrypted log, never in the
/// plaintext index or anywhere else in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiVaultEntry {
    /// Random id, `pii_<12 hex>`.
    pub entry_id: String,

    /// The owning vault.
    pub vault_id: String,

    /// The claim this vault is scoped to.
    pub claim_id: String,

    /// Document the value was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,

    /// Pipeline run that extracted the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Category that classified the field as PII.
    pub pii_category: String,

    /// Path of the field within the extraction result.
    pub field_path: String,

    /// The protected value.
    pub original_value: String,
}

impl PiiVaultEntry {
    /// Non-sensitive metadata for the plaintext index.
    #[must_use]
    pub fn meta(&self) -> PiiEntryMeta {
        PiiEntryMeta {
            pii_category: self.pii_category.clone(),
            field_path: self.field_path.clone(),
            doc_id: self.doc_id.clone(),
            run_id: self.run_id.clone(),
        }
    }
}

/// Non-sensitive per-entry metadata held in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiEntryMeta {
    /// Category that classified the field.
    pub pii_category: String,

    /// Field path within the extraction result.
    pub field_path: String,

    /// Source document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,

    /// Producing run, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Plaintext per-vault index.
///
/// Holds discovery metadata and the shred markers. Protected values never
/// appear here: the index survives crypto-shredding precisely so the
/// audit trail of *what was shredded and why* remains readable after the
/// key is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiVaultIndex {
    /// Index document schema version.
    pub schema_version: u8,

    /// The vault this index belongs to.
    pub vault_id: String,

    /// The claim the vault is scoped to.
    pub claim_id: String,

    /// Live entries by id.
    #[serde(default)]
    pub entries: BTreeMap<String, PiiEntryMeta>,

    /// True once the vault has been crypto-shredded.
    #[serde(default)]
    pub shredded: bool,

    /// When the vault was shredded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shredded_at: Option<DateTime<Utc>>,

    /// Why the vault was shredded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shred_reason: Option<String>,
}

impl PiiVaultIndex {
    /// A fresh, empty index for a new vault.
    #[must_use]
    pub fn new(vault_id: impl Into<String>, claim_id: impl Into<String>) -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            vault_id: vault_id.into(),
            claim_id: claim_id.into(),
            entries: BTreeMap::new(),
            shredded: false,
            shredded_at: None,
            shred_reason: None,
        }
    }
}
