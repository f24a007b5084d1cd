//! Tests for the decision ledger.

use std::fs;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use super::*;
use crate::crypto::GENESIS_HASH;
use crate::storage::{PlaintextFileStore, StorageBackend, StorageFactory};

/// Helper to create a plaintext-backed ledger in a temp dir.
fn temp_ledger() -> (DecisionLedger, PathBuf, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("decisions.log");
    let store = PlaintextFileStore::open(&path).expect("failed to open store");
    (DecisionLedger::new(Box::new(store)), path, dir)
}

/// Helper to create an encrypted-backed ledger in a temp dir.
fn temp_encrypted_ledger() -> (DecisionLedger, PathBuf, PathBuf, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("decisions.log");
    let key_path = dir.path().join("ledger.key");
    let store = StorageFactory::open(StorageBackend::EncryptedFile, &path, Some(&key_path))
        .expect("failed to open store");
    (DecisionLedger::new(store), path, key_path, dir)
}

fn sample_record(summary: &str) -> DecisionRecord {
    DecisionRecord::classification(
        Rationale::new(summary, 0.9),
        json!({"doc_type": "invoice"}),
        Actor::system("classifier"),
    )
}

/// Rewrites one JSON line of a plaintext ledger file in place.
fn edit_line(path: &Path, index: usize, edit: impl FnOnce(&mut Value)) {
    let content = fs::read_to_string(path).expect("failed to read ledger file");
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let mut value: Value = serde_json::from_str(&lines[index]).expect("line is not JSON");
    edit(&mut value);
    lines[index] = serde_json::to_string(&value).expect("failed to serialize line");
    fs::write(path, lines.join("\n") + "\n").expect("failed to rewrite ledger file");
}

fn reopen(path: &Path) -> DecisionLedger {
    let store = PlaintextFileStore::open(path).expect("failed to reopen store");
    DecisionLedger::new(Box::new(store))
}

#[test]
fn empty_ledger_verifies_and_reports_genesis() {
    let (ledger, _path, _dir) = temp_ledger();
    assert_eq!(ledger.get_last_hash().unwrap(), GENESIS_HASH);

    let report = ledger.verify_integrity().unwrap();
    assert!(report.valid);
    assert_eq!(report.total_records, 0);
    assert_eq!(report.break_at_index, None);
}

#[test]
fn append_populates_id_and_chain_fields() {
    let (ledger, _path, _dir) = temp_ledger();
    let appended = ledger.append(sample_record("first")).unwrap();

    let id = appended.decision_id.expect("id assigned");
    assert!(id.starts_with("dec_"));
    assert_eq!(appended.previous_hash.as_deref(), Some(GENESIS_HASH));
    let hash = appended.record_hash.expect("hash assigned");
    assert_eq!(ledger.get_last_hash().unwrap(), hash);
}

#[test]
fn append_preserves_explicit_decision_id() {
    let (ledger, _path, _dir) = temp_ledger();
    let mut record = sample_record("explicit");
    record.decision_id = Some("dec_fixedid00001".to_string());
    let appended = ledger.append(record).unwrap();
    assert_eq!(appended.decision_id.as_deref(), Some("dec_fixedid00001"));
}

#[test]
fn records_chain_in_append_order() {
    let (ledger, _path, _dir) = temp_ledger();
    let a = ledger.append(sample_record("a")).unwrap();
    let b = ledger.append(sample_record("b")).unwrap();
    let c = ledger.append(sample_record("c")).unwrap();

    assert_eq!(a.previous_hash.as_deref(), Some(GENESIS_HASH));
    assert_eq!(b.previous_hash, a.record_hash);
    assert_eq!(c.previous_hash, b.record_hash);

    let report = ledger.verify_integrity().unwrap();
    assert!(report.valid);
    assert_eq!(report.total_records, 3);
}

#[test]
fn corrupting_stored_hash_breaks_at_that_record() {
    let (ledger, path, _dir) = temp_ledger();
    for summary in ["a", "b", "c"] {
        ledger.append(sample_record(summary)).unwrap();
    }

    edit_line(&path, 1, |value| {
        value["record_hash"] = Value::String("f".repeat(64));
    });

    let report = reopen(&path).verify_integrity().unwrap();
    assert!(!report.valid);
    assert_eq!(report.break_at_index, Some(1));
    assert_eq!(report.error_type, Some(IntegrityViolation::HashMismatch));
    // The walk still counts every record past the break.
    assert_eq!(report.total_records, 3);
}

#[test]
fn corrupting_previous_hash_reports_chain_break() {
    let (ledger, path, _dir) = temp_ledger();
    for summary in ["a", "b", "c"] {
        ledger.append(sample_record(summary)).unwrap();
    }

    edit_line(&path, 2, |value| {
        value["previous_hash"] = Value::String("0".repeat(63) + "1");
    });

    let report = reopen(&path).verify_integrity().unwrap();
    assert!(!report.valid);
    assert_eq!(report.break_at_index, Some(2));
    assert_eq!(report.error_type, Some(IntegrityViolation::ChainBroken));
}

#[test]
fn mutating_record_content_is_detected() {
    let (ledger, path, _dir) = temp_ledger();
    for summary in ["a", "b", "c"] {
        ledger.append(sample_record(summary)).unwrap();
    }

    edit_line(&path, 0, |value| {
        value["rationale"]["summary"] = Value::String("rewritten history".to_string());
    });

    let report = reopen(&path).verify_integrity().unwrap();
    assert!(!report.valid);
    assert_eq!(report.break_at_index, Some(0));
    assert_eq!(report.error_type, Some(IntegrityViolation::HashMismatch));
}

#[test]
fn malformed_line_is_an_integrity_failure() {
    let (ledger, path, _dir) = temp_ledger();
    ledger.append(sample_record("a")).unwrap();

    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("not json at all\n");
    fs::write(&path, content).unwrap();

    let reopened = reopen(&path);
    let report = reopened.verify_integrity().unwrap();
    assert!(!report.valid);
    assert_eq!(report.break_at_index, Some(1));
    assert_eq!(report.error_type, Some(IntegrityViolation::MalformedRecord));

    // Normal reads skip the junk line instead of failing.
    assert_eq!(reopened.query(&LedgerQuery::new(), 100).unwrap().len(), 1);
}

#[test]
fn get_by_id_finds_appended_record() {
    let (ledger, _path, _dir) = temp_ledger();
    let appended = ledger
        .append(sample_record("target").with_claim_id("CLM001"))
        .unwrap();
    let id = appended.decision_id.as_deref().unwrap();

    let found = ledger.get_by_id(id).unwrap().expect("record present");
    assert_eq!(found, appended);
    assert!(ledger.get_by_id("dec_missing00000").unwrap().is_none());
}

#[test]
fn query_filters_combine_with_and() {
    let (ledger, _path, _dir) = temp_ledger();
    ledger
        .append(sample_record("a").with_claim_id("CLM001").with_doc_id("D1"))
        .unwrap();
    ledger
        .append(
            DecisionRecord::quality_gate(
                Rationale::new("gate pass", 1.0),
                json!({"passed": true}),
                Actor::system("gatekeeper"),
            )
            .with_claim_id("CLM001"),
        )
        .unwrap();
    ledger
        .append(sample_record("c").with_claim_id("CLM002").with_doc_id("D1"))
        .unwrap();

    let query = LedgerQuery::new()
        .with_decision_type(DecisionType::Classification)
        .with_claim_id("CLM001");
    let results = ledger.query(&query, 100).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rationale.summary, "a");

    let by_doc = ledger
        .query(&LedgerQuery::new().with_doc_id("D1"), 100)
        .unwrap();
    assert_eq!(by_doc.len(), 2);
    // Append order is preserved.
    assert_eq!(by_doc[0].rationale.summary, "a");
    assert_eq!(by_doc[1].rationale.summary, "c");
}

#[test]
fn query_respects_limit() {
    let (ledger, _path, _dir) = temp_ledger();
    for i in 0..5 {
        ledger.append(sample_record(&format!("r{i}"))).unwrap();
    }
    let results = ledger.query(&LedgerQuery::new(), 3).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[2].rationale.summary, "r2");
}

#[test]
fn chain_survives_reopen() {
    let (ledger, path, _dir) = temp_ledger();
    ledger.append(sample_record("a")).unwrap();
    ledger.append(sample_record("b")).unwrap();
    drop(ledger);

    let reopened = reopen(&path);
    reopened.append(sample_record("c")).unwrap();

    let report = reopened.verify_integrity().unwrap();
    assert!(report.valid);
    assert_eq!(report.total_records, 3);
}

#[test]
fn stats_report_count_and_head() {
    let (ledger, _path, _dir) = temp_ledger();
    assert_eq!(ledger.stats().unwrap().total_records, 0);
    assert_eq!(ledger.stats().unwrap().head_hash, GENESIS_HASH);

    let b = ledger.append(sample_record("a")).unwrap();
    let stats = ledger.stats().unwrap();
    assert_eq!(stats.total_records, 1);
    assert_eq!(Some(stats.head_hash), b.record_hash);
}

#[test]
fn encrypted_ledger_appends_and_verifies() {
    let (ledger, path, _key, _dir) = temp_encrypted_ledger();
    for summary in ["a", "b", "c"] {
        ledger.append(sample_record(summary)).unwrap();
    }

    let report = ledger.verify_integrity().unwrap();
    assert!(report.valid);
    assert_eq!(report.total_records, 3);

    // Plaintext record content never reaches disk.
    let raw = fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("classifier"));
    assert!(!raw.contains("invoice"));
}

#[test]
fn encrypted_tampered_line_is_skipped_on_read_but_fails_verify() {
    let (ledger, path, key_path, _dir) = temp_encrypted_ledger();
    let a = ledger.append(sample_record("a")).unwrap();
    let b = ledger.append(sample_record("b")).unwrap();
    let c = ledger.append(sample_record("c")).unwrap();
    drop(ledger);

    // Corrupt the middle ciphertext line.
    let content = fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let flipped = if lines[1].starts_with('A') { "B" } else { "A" };
    lines[1].replace_range(0..1, flipped);
    fs::write(&path, lines.join("\n") + "\n").unwrap();

    let store = StorageFactory::open(StorageBackend::EncryptedFile, &path, Some(&key_path))
        .expect("failed to reopen store");
    let reopened = DecisionLedger::new(store);

    // Normal reads treat the line as absent.
    let b_id = b.decision_id.as_deref().unwrap();
    assert!(reopened.get_by_id(b_id).unwrap().is_none());
    assert!(reopened
        .get_by_id(a.decision_id.as_deref().unwrap())
        .unwrap()
        .is_some());
    assert!(reopened
        .get_by_id(c.decision_id.as_deref().unwrap())
        .unwrap()
        .is_some());

    // Verification treats it as tamper evidence.
    let report = reopened.verify_integrity().unwrap();
    assert!(!report.valid);
    assert_eq!(report.break_at_index, Some(1));
    assert_eq!(
        report.error_type,
        Some(IntegrityViolation::UnreadableRecord)
    );
    assert_eq!(report.total_records, 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Any sequence of appended records verifies clean with an exact count.
    #[test]
    fn appended_chains_always_verify(summaries in proptest::collection::vec("[a-z0-9 ]{0,40}", 0..6)) {
        let (ledger, _path, _dir) = temp_ledger();
        for summary in &summaries {
            ledger.append(sample_record(summary)).unwrap();
        }
        let report = ledger.verify_integrity().unwrap();
        prop_assert!(report.valid);
        prop_assert_eq!(report.total_records, summaries.len());
    }
}
