//! Tests for the PII vault.

use std::fs;

use tempfile::TempDir;

use super::*;

fn sample_entry(entry_id: &str, field: &str, value: &str) -> PiiVaultEntry {
    PiiVaultEntry {
        entry_id: entry_id.to_string(),
        vault_id: "vault_CLM001".to_string(),
        claim_id: "CLM001".to_string(),
        doc_id: Some("DOC1".to_string()),
        run_id: Some("run-7".to_string()),
        pii_category: "person_name".to_string(),
        field_path: field.to_string(),
        original_value: value.to_string(),
    }
}

fn temp_vault() -> (PiiVault, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let vault = PiiVault::create_or_open(dir.path(), "CLM001").expect("failed to open vault");
    (vault, dir)
}

#[test]
fn first_use_creates_key_and_index() {
    let (vault, _dir) = temp_vault();
    assert_eq!(vault.vault_id(), "vault_CLM001");
    assert_eq!(vault.claim_id(), "CLM001");
    assert!(vault.dir().join(KEY_FILE).exists());
    assert!(vault.dir().join(INDEX_FILE).exists());
    assert!(!vault.is_shredded());
    assert_eq!(vault.entry_count().unwrap(), 0);
}

#[test]
fn store_and_get_roundtrip() {
    let (vault, _dir) = temp_vault();
    let entry = sample_entry("pii_000000000001", "full_name", "John Smith");
    assert_eq!(vault.store(&[entry.clone()]).unwrap(), 1);

    let fetched = vault.get("pii_000000000001").unwrap().expect("entry found");
    assert_eq!(fetched, entry);
    assert_eq!(vault.entry_count().unwrap(), 1);
}

#[test]
fn protected_values_never_reach_disk_in_plaintext() {
    let (vault, _dir) = temp_vault();
    vault
        .store(&[sample_entry("pii_000000000001", "full_name", "John Smith")])
        .unwrap();

    let log = fs::read_to_string(vault.dir().join(LOG_FILE)).unwrap();
    assert!(!log.contains("John Smith"));
    let index = fs::read_to_string(vault.dir().join(INDEX_FILE)).unwrap();
    assert!(!index.contains("John Smith"));
    // The index does carry the non-sensitive metadata.
    assert!(index.contains("person_name"));
    assert!(index.contains("full_name"));
}

#[test]
fn get_batch_resolves_only_known_ids() {
    let (vault, _dir) = temp_vault();
    vault
        .store(&[
            sample_entry("pii_000000000001", "full_name", "John Smith"),
            sample_entry("pii_000000000002", "dob", "1980-01-02"),
        ])
        .unwrap();

    let batch = vault
        .get_batch(&[
            "pii_000000000001".to_string(),
            "pii_does_not_exist".to_string(),
        ])
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch["pii_000000000001"].original_value, "John Smith");
}

#[test]
fn list_by_doc_uses_the_index() {
    let (vault, _dir) = temp_vault();
    let mut other_doc = sample_entry("pii_000000000002", "dob", "1980-01-02");
    other_doc.doc_id = Some("DOC2".to_string());
    vault
        .store(&[
            sample_entry("pii_000000000001", "full_name", "John Smith"),
            other_doc,
        ])
        .unwrap();

    let entries = vault.list_by_doc("DOC1").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field_path, "full_name");
    assert!(vault.list_by_doc("DOC9").unwrap().is_empty());
}

#[test]
fn vault_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let vault = PiiVault::create_or_open(dir.path(), "CLM001").unwrap();
        vault
            .store(&[sample_entry("pii_000000000001", "full_name", "John Smith")])
            .unwrap();
    }
    let reopened = PiiVault::open_existing(dir.path(), "vault_CLM001").unwrap();
    assert_eq!(reopened.claim_id(), "CLM001");
    let fetched = reopened.get("pii_000000000001").unwrap().unwrap();
    assert_eq!(fetched.original_value, "John Smith");
}

#[test]
fn open_existing_unknown_vault_is_not_found() {
    let dir = TempDir::new().unwrap();
    let result = PiiVault::open_existing(dir.path(), "vault_NOPE");
    assert!(matches!(result, Err(VaultError::NotFound { .. })));
}

#[test]
fn wrong_vault_entry_is_rejected_but_prior_appends_stay_indexed() {
    let (vault, _dir) = temp_vault();
    let good = sample_entry("pii_000000000001", "full_name", "John Smith");
    let mut stray = sample_entry("pii_000000000002", "dob", "1980-01-02");
    stray.vault_id = "vault_CLM999".to_string();

    let result = vault.store(&[good, stray]);
    assert!(matches!(result, Err(VaultError::WrongVault { .. })));

    // The batch is at-least-once: the first entry was recorded and the
    // index reflects exactly the successful appends.
    assert_eq!(vault.entry_count().unwrap(), 1);
    assert!(vault.get("pii_000000000001").unwrap().is_some());
    assert!(vault.get("pii_000000000002").unwrap().is_none());
}

#[test]
fn shred_vault_lifecycle() {
    let (vault, _dir) = temp_vault();
    vault
        .store(&[sample_entry("pii_000000000001", "full_name", "John Smith")])
        .unwrap();

    // Wrong id is refused without side effects.
    assert!(!vault.shred_vault("vault_CLM999", "gdpr request").unwrap());
    assert!(!vault.is_shredded());

    assert!(vault.shred_vault("vault_CLM001", "gdpr request").unwrap());
    assert!(vault.is_shredded());
    assert!(!vault.dir().join(KEY_FILE).exists());

    // The audit trail survives key destruction.
    let index = fs::read_to_string(vault.dir().join(INDEX_FILE)).unwrap();
    assert!(index.contains("\"shredded\": true"));
    assert!(index.contains("gdpr request"));

    // Every subsequent operation fails closed.
    assert!(matches!(
        vault.get("pii_000000000001"),
        Err(VaultError::Shredded { .. })
    ));
    assert!(matches!(
        vault.store(&[sample_entry("pii_000000000003", "dob", "1980-01-02")]),
        Err(VaultError::Shredded { .. })
    ));
    assert!(matches!(
        vault.shred_entries(&["pii_000000000001".to_string()], "cleanup"),
        Err(VaultError::Shredded { .. })
    ));

    // Second shred is a no-op.
    assert!(!vault.shred_vault("vault_CLM001", "again").unwrap());
}

#[test]
fn shredded_vault_stays_shredded_after_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let vault = PiiVault::create_or_open(dir.path(), "CLM001").unwrap();
        vault
            .store(&[sample_entry("pii_000000000001", "full_name", "John Smith")])
            .unwrap();
        assert!(vault.shred_vault("vault_CLM001", "gdpr request").unwrap());
    }

    let reopened = PiiVault::open_existing(dir.path(), "vault_CLM001").unwrap();
    assert!(reopened.is_shredded());
    assert!(matches!(
        reopened.get("pii_000000000001"),
        Err(VaultError::Shredded { .. })
    ));

    // Ciphertext is retained but inert.
    assert!(reopened.dir().join(LOG_FILE).exists());
    assert!(!reopened.dir().join(KEY_FILE).exists());
}

#[test]
fn missing_key_on_populated_vault_is_treated_as_shredded() {
    let dir = TempDir::new().unwrap();
    {
        let vault = PiiVault::create_or_open(dir.path(), "CLM001").unwrap();
        vault
            .store(&[sample_entry("pii_000000000001", "full_name", "John Smith")])
            .unwrap();
    }
    // Key file lost out-of-band; the vault must not mint a replacement.
    fs::remove_file(dir.path().join("vault_CLM001").join(KEY_FILE)).unwrap();

    let reopened = PiiVault::open_existing(dir.path(), "vault_CLM001").unwrap();
    assert!(reopened.is_shredded());
    assert!(matches!(
        reopened.get("pii_000000000001"),
        Err(VaultError::Shredded { .. })
    ));
    assert!(!dir.path().join("vault_CLM001").join(KEY_FILE).exists());
}

#[test]
fn shred_entries_removes_from_index_only() {
    let (vault, _dir) = temp_vault();
    vault
        .store(&[
            sample_entry("pii_000000000001", "full_name", "John Smith"),
            sample_entry("pii_000000000002", "dob", "1980-01-02"),
        ])
        .unwrap();

    let removed = vault
        .shred_entries(
            &[
                "pii_000000000001".to_string(),
                "pii_not_present".to_string(),
            ],
            "field-level erasure",
        )
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(vault.entry_count().unwrap(), 1);

    // The shredded entry is no longer discoverable, the other remains.
    assert!(vault.get("pii_000000000001").unwrap().is_none());
    assert!(vault.get("pii_000000000002").unwrap().is_some());

    // The ciphertext line itself is untouched.
    let log_lines = fs::read_to_string(vault.dir().join(LOG_FILE)).unwrap();
    assert_eq!(log_lines.lines().count(), 2);
}

#[test]
fn vault_ids_are_deterministic_per_claim() {
    assert_eq!(vault_id_for_claim("CLM001"), "vault_CLM001");
    assert_eq!(vault_id_for_claim("CLM001"), vault_id_for_claim("CLM001"));
    assert_ne!(vault_id_for_claim("CLM001"), vault_id_for_claim("CLM002"));
}
