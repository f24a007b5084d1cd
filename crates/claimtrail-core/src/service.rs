//! The audit service: one constructed context for ledger, vaults, and
//! tokenizer.
//!
//! Callers build an [`AuditService`] once at startup from an
//! [`AuditConfig`] and pass a reference to every pipeline stage that
//! records decisions or handles extracted PII. There is no process-wide
//! state: two services over different storage roots are fully
//! independent, and everything a component touches is reachable from the
//! reference it was handed.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::config::{AuditConfig, ConfigError};
use crate::ledger::{
    DecisionLedger, DecisionRecord, IntegrityReport, LedgerError, LedgerQuery,
};
use crate::storage::{StorageError, StorageFactory};
use crate::tokenizer::{
    collect_result_tokens, detokenize, ExtractionResult, PiiTokenizer, TokenizationResult,
    TokenizerConfigError,
};
use crate::vault::{vault_id_for_claim, PiiVault, PiiVaultEntry, VaultError};

/// Errors from audit service operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Vault failure.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Tokenizer configuration failure.
    #[error(transparent)]
    Tokenizer(#[from] TokenizerConfigError),

    /// I/O failure preparing the storage root.
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Explicitly injected audit context.
///
/// Owns the decision ledger and the tokenizer; per-claim vaults are
/// opened on demand under the configured vault root.
pub struct AuditService {
    ledger: DecisionLedger,
    tokenizer: PiiTokenizer,
    vault_root: PathBuf,
}

impl AuditService {
    /// Builds the service from configuration.
    ///
    /// Creates the storage root, opens the ledger through the configured
    /// backend (generating the ledger key on first use of the encrypted
    /// backend), and compiles the tokenizer.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be prepared or the tokenizer
    /// configuration does not compile.
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        fs::create_dir_all(&config.storage.root)?;
        let store = StorageFactory::open(
            config.ledger.backend,
            &config.ledger_path(),
            Some(&config.ledger_key_path()),
        )?;
        Ok(Self {
            ledger: DecisionLedger::new(store),
            tokenizer: PiiTokenizer::new(&config.tokenizer)?,
            vault_root: config.vault_root(),
        })
    }

    /// Assembles the service from already-built parts.
    #[must_use]
    pub fn from_parts(
        ledger: DecisionLedger,
        tokenizer: PiiTokenizer,
        vault_root: PathBuf,
    ) -> Self {
        Self {
            ledger,
            tokenizer,
            vault_root,
        }
    }

    /// The decision ledger.
    #[must_use]
    pub const fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    /// The tokenizer.
    #[must_use]
    pub const fn tokenizer(&self) -> &PiiTokenizer {
        &self.tokenizer
    }

    /// Appends a decision to the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub fn record_decision(&self, record: DecisionRecord) -> Result<DecisionRecord, AuditError> {
        Ok(self.ledger.append(record)?)
    }

    /// Queries decisions, in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn query_decisions(
        &self,
        query: &LedgerQuery,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>, AuditError> {
        Ok(self.ledger.query(query, limit)?)
    }

    /// Verifies the full ledger hash chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn verify_ledger(&self) -> Result<IntegrityReport, AuditError> {
        Ok(self.ledger.verify_integrity()?)
    }

    /// Tokenizes an extraction result and persists the minted entries
    /// into the claim's vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault rejects the batch (including
    /// [`VaultError::Shredded`] for a previously shredded claim).
    pub fn tokenize_and_store(
        &self,
        extraction: &ExtractionResult,
        run_id: &str,
    ) -> Result<TokenizationResult, AuditError> {
        let result = self.tokenizer.tokenize(extraction, run_id);

        let mut by_vault: HashMap<String, Vec<PiiVaultEntry>> = HashMap::new();
        for entry in &result.vault_entries {
            by_vault
                .entry(entry.vault_id.clone())
                .or_default()
                .push(entry.clone());
        }
        for batch in by_vault.into_values() {
            let claim_id = &batch[0].claim_id;
            let vault = PiiVault::create_or_open(&self.vault_root, claim_id)?;
            vault.store(&batch)?;
        }
        Ok(result)
    }

    /// Resolves every resolvable token in a redacted tree back to its
    /// original value.
    ///
    /// Tokens pointing at missing or shredded vaults, or at shredded
    /// entries, are left in place — the output degrades to the redacted
    /// form rather than fabricating data.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failures other than missing or
    /// shredded vaults.
    pub fn detokenize(&self, extraction: &ExtractionResult) -> Result<ExtractionResult, AuditError> {
        let tokens = collect_result_tokens(extraction);
        let mut by_vault: HashMap<String, Vec<String>> = HashMap::new();
        for token in tokens {
            by_vault
                .entry(token.vault_id)
                .or_default()
                .push(token.entry_id);
        }

        let mut lookup: HashMap<String, PiiVaultEntry> = HashMap::new();
        for (vault_id, entry_ids) in by_vault {
            let vault = match PiiVault::open_existing(&self.vault_root, &vault_id) {
                Ok(vault) => vault,
                Err(VaultError::NotFound { .. }) => {
                    warn!(%vault_id, "detokenize: vault not found; leaving tokens in place");
                    continue;
                },
                Err(err) => return Err(err.into()),
            };
            match vault.get_batch(&entry_ids) {
                Ok(found) => lookup.extend(found),
                Err(VaultError::Shredded { .. }) => {
                    warn!(%vault_id, "detokenize: vault shredded; leaving tokens in place");
                },
                Err(err) => return Err(err.into()),
            }
        }

        Ok(detokenize(extraction, &lookup))
    }

    /// Opens (creating on first use) the vault for a claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault cannot be opened.
    pub fn open_vault(&self, claim_id: &str) -> Result<PiiVault, AuditError> {
        Ok(PiiVault::create_or_open(&self.vault_root, claim_id)?)
    }

    /// Crypto-shreds a claim's vault for right-to-erasure.
    ///
    /// Returns `false` when the claim has no vault or it was already
    /// shredded.
    ///
    /// # Errors
    ///
    /// Returns an error if the shred itself fails partway.
    pub fn shred_claim(&self, claim_id: &str, reason: &str) -> Result<bool, AuditError> {
        let vault_id = vault_id_for_claim(claim_id);
        match PiiVault::open_existing(&self.vault_root, &vault_id) {
            Ok(vault) => Ok(vault.shred_vault(&vault_id, reason)?),
            Err(VaultError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
