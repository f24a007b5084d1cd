//! Cryptographic primitives shared by the ledger and the vault.
//!
//! Two primitives live here:
//!
//! - **BLAKE3 record hashing**: every ledger record commits to its own
//!   canonical bytes and to the previous record's digest, forming the
//!   hash chain that makes retroactive edits detectable.
//! - **Envelope encryption**: AES-256-GCM with a per-unit key file. The
//!   ciphertext carries its own nonce, and destroying the key file is the
//!   system's only irreversible deletion mechanism (crypto-shredding).
//!
//! # Example
//!
//! ```
//! use claimtrail_core::crypto::{EnvelopeEncryptor, RecordHasher, GENESIS_HASH};
//!
//! # fn example() -> Result<(), claimtrail_core::crypto::CryptoError> {
//! let key = EnvelopeEncryptor::generate_key();
//! let encryptor = EnvelopeEncryptor::from_key_bytes(key.as_ref())?;
//! let ciphertext = encryptor.encrypt(b"field value")?;
//! assert_eq!(encryptor.decrypt(&ciphertext)?, b"field value");
//!
//! let digest = RecordHasher::hash_canonical(b"{\"decision\":\"approve\"}");
//! assert_ne!(digest, GENESIS_HASH);
//! # Ok(())
//! # }
//! ```

mod envelope;
mod hash;

pub use envelope::{CryptoError, EnvelopeEncryptor, KEY_SIZE, NONCE_SIZE};
pub use hash::{digests_match, is_genesis, RecordHasher, GENESIS_HASH, HASH_SIZE};
