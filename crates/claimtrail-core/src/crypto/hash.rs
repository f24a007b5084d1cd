//! BLAKE3 record hashing for the decision ledger hash chain.

use subtle::ConstantTimeEq;

/// Size of a BLAKE3 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// Sentinel `previous_hash` value for the first record in a ledger.
///
/// Hex encoding of the all-zero digest, matching the genesis convention
/// used by the chain verifier.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hasher for decision records.
///
/// Computes the digest that commits a record to the chain: the hash is
/// taken over the record's canonical serialization with the `record_hash`
/// field excluded, so the stored digest can be recomputed and checked
/// against any later copy of the record.
pub struct RecordHasher;

impl RecordHasher {
    /// Hashes canonical record bytes, returning the hex-encoded digest.
    #[must_use]
    pub fn hash_canonical(canonical: &[u8]) -> String {
        hex::encode(blake3::hash(canonical).as_bytes())
    }
}

/// Compares two hex digests in constant time.
///
/// Digests of differing length never match.
#[must_use]
pub fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Returns `true` if the digest is the genesis sentinel.
#[must_use]
pub fn is_genesis(digest: &str) -> bool {
    digests_match(digest, GENESIS_HASH)
}
