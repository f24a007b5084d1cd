//! AES-256-GCM envelope encryption with file-backed keys.
//!
//! Every logical storage unit (a vault, an encrypted ledger) owns exactly
//! one key file. Ciphertext is self-describing: the random nonce is
//! prepended to the AEAD output, so a single byte string round-trips with
//! no external state. Deleting the key file renders every ciphertext
//! produced under it permanently unrecoverable, which is the mechanism
//! behind crypto-shredding.
//!
//! Key bytes are held in [`Zeroizing`] buffers while in transit and are
//! never included in log output or error messages.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of a raw envelope key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Length of the GCM nonce prepended to every ciphertext.
pub const NONCE_SIZE: usize = 12;

/// Errors from envelope encryption operations.
///
/// Variants deliberately carry no key or plaintext material.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CryptoError {
    /// Authentication failed: wrong key, tampered, or truncated input.
    #[error("decryption failed: ciphertext did not authenticate")]
    Decryption,

    /// Encryption failed. Should not occur with a well-formed key.
    #[error("encryption failed")]
    Encryption,

    /// Key file held the wrong number of bytes.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// The required key length.
        expected: usize,
        /// The length actually read.
        actual: usize,
    },

    /// I/O error reading or writing a key file.
    #[error("key file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authenticated symmetric encryptor bound to a single key.
pub struct EnvelopeEncryptor {
    cipher: Aes256Gcm,
}

impl EnvelopeEncryptor {
    /// Generates a fresh random key.
    #[must_use]
    pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(key.as_mut());
        key
    }

    /// Generates a key and persists it as a new raw-bytes file.
    ///
    /// The file is created with `create_new` semantics (never overwrites
    /// an existing key) and mode 0600 on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    pub fn write_key_file(path: &Path) -> Result<(), CryptoError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let key = Self::generate_key();
        let mut opts = OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(path)?;
        file.write_all(key.as_ref())?;
        file.sync_all()?;
        Ok(())
    }

    /// Constructs an encryptor from a raw key file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold
    /// exactly [`KEY_SIZE`] bytes.
    pub fn from_key_file(path: &Path) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(fs::read(path)?);
        Self::from_key_bytes(&bytes)
    }

    /// Constructs an encryptor from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` if the slice is not [`KEY_SIZE`] bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key.len(),
            })?;
        Ok(Self { cipher })
    }

    /// Encrypts a plaintext, returning `nonce || ciphertext+tag`.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if the AEAD rejects the input.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts a `nonce || ciphertext+tag` byte string.
    ///
    /// # Errors
    ///
    /// Returns `Decryption` for truncated input or any authentication
    /// failure. Never returns data that failed authentication.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE {
            return Err(CryptoError::Decryption);
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, body)
            .map_err(|_| CryptoError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn roundtrip() {
        let key = EnvelopeEncryptor::generate_key();
        let enc = EnvelopeEncryptor::from_key_bytes(key.as_ref()).unwrap();
        let ct = enc.encrypt(b"sensitive payload").unwrap();
        assert_ne!(&ct[NONCE_SIZE..], b"sensitive payload".as_slice());
        assert_eq!(enc.decrypt(&ct).unwrap(), b"sensitive payload");
    }

    #[test]
    fn distinct_nonces_per_encryption() {
        let key = EnvelopeEncryptor::generate_key();
        let enc = EnvelopeEncryptor::from_key_bytes(key.as_ref()).unwrap();
        let a = enc.encrypt(b"same").unwrap();
        let b = enc.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let enc_a =
            EnvelopeEncryptor::from_key_bytes(EnvelopeEncryptor::generate_key().as_ref()).unwrap();
        let enc_b =
            EnvelopeEncryptor::from_key_bytes(EnvelopeEncryptor::generate_key().as_ref()).unwrap();
        let ct = enc_a.encrypt(b"payload").unwrap();
        assert!(matches!(enc_b.decrypt(&ct), Err(CryptoError::Decryption)));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let enc =
            EnvelopeEncryptor::from_key_bytes(EnvelopeEncryptor::generate_key().as_ref()).unwrap();
        let mut ct = enc.encrypt(b"payload").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(matches!(enc.decrypt(&ct), Err(CryptoError::Decryption)));
    }

    #[test]
    fn truncated_input_fails_closed() {
        let enc =
            EnvelopeEncryptor::from_key_bytes(EnvelopeEncryptor::generate_key().as_ref()).unwrap();
        assert!(matches!(enc.decrypt(b"short"), Err(CryptoError::Decryption)));
        let ct = enc.encrypt(b"payload").unwrap();
        assert!(matches!(
            enc.decrypt(&ct[..ct.len() - 4]),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn key_file_roundtrip_and_no_overwrite() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("unit.key");
        EnvelopeEncryptor::write_key_file(&key_path).unwrap();
        assert_eq!(fs::read(&key_path).unwrap().len(), KEY_SIZE);

        let enc = EnvelopeEncryptor::from_key_file(&key_path).unwrap();
        let ct = enc.encrypt(b"x").unwrap();
        assert_eq!(enc.decrypt(&ct).unwrap(), b"x");

        // A second write must not clobber the existing key.
        assert!(EnvelopeEncryptor::write_key_file(&key_path).is_err());
    }

    #[test]
    fn short_key_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("short.key");
        fs::write(&key_path, [0u8; 7]).unwrap();
        assert!(matches!(
            EnvelopeEncryptor::from_key_file(&key_path),
            Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: 7
            })
        ));
    }
}
