//! Per-claim encrypted PII vaults with crypto-shredding.
//!
//! Each claim gets its own vault: a directory holding an envelope key,
//! an append-only encrypted entry log, and a plaintext index of
//! non-sensitive metadata. Protected values exist *only* inside the
//! encrypted log; everywhere else in the system they are represented by
//! `[PII:<vault_id>:<entry_id>]` tokens.
//!
//! # Crypto-shredding
//!
//! Right-to-erasure is implemented by destroying the vault's key:
//! [`PiiVault::shred_vault`] marks the index, overwrites the key file
//! with random bytes, and deletes it. The ciphertext stays on disk but
//! is permanently unrecoverable, and the index keeps recording what was
//! shredded, when, and why. [`PiiVault::shred_entries`] is the weaker,
//! index-only form for removing individual entries from discovery.
//!
//! # Read discipline
//!
//! Lookups decrypt the log sequentially with an early stop — the
//! append-only write path is prioritized over read locality, matching
//! the ledger's trade-off.

mod entry;
mod store;

#[cfg(test)]
mod tests;

pub use entry::{PiiEntryMeta, PiiVaultEntry, PiiVaultIndex, INDEX_SCHEMA_VERSION};
pub use store::{vault_id_for_claim, PiiVault, VaultError, INDEX_FILE, KEY_FILE, LOG_FILE};
