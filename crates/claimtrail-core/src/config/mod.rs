//! Audit subsystem configuration.
//!
//! Parses the TOML document that wires the subsystem at startup: where
//! records live, which storage backend the ledger uses, and how the
//! tokenizer classifies fields. Validation is fail-closed — a config
//! with an uncompilable category pattern is rejected at load time, not
//! discovered mid-run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::StorageBackend;
use crate::tokenizer::TokenizerConfig;

/// Top-level audit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Storage locations.
    #[serde(default)]
    pub storage: StorageSection,

    /// Decision ledger settings.
    #[serde(default)]
    pub ledger: LedgerSection,

    /// Tokenizer settings.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Root directory for the ledger file, keys, and vaults.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

/// Decision ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Storage backend for the ledger file.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Ledger file name, relative to the storage root.
    #[serde(default = "default_ledger_file")]
    pub file: PathBuf,

    /// Key file for the encrypted backend, relative to the storage
    /// root. Defaults to `ledger.key`; ignored by the plaintext backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            file: default_ledger_file(),
            key_file: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("audit")
}

fn default_ledger_file() -> PathBuf {
    PathBuf::from("decisions.log")
}

fn default_ledger_key_file() -> PathBuf {
    PathBuf::from("ledger.key")
}

impl AuditConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or
    /// validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an uncompilable tokenizer
    /// configuration or an absolute ledger path escaping the root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tokenizer
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        if self.ledger.file.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "ledger.file must be relative to storage.root, got {}",
                self.ledger.file.display()
            )));
        }
        if let Some(key_file) = &self.ledger.key_file {
            if key_file.is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "ledger.key_file must be relative to storage.root, got {}",
                    key_file.display()
                )));
            }
        }
        Ok(())
    }

    /// Absolute-ish path of the ledger file.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.storage.root.join(&self.ledger.file)
    }

    /// Path of the ledger key file (used by the encrypted backend).
    #[must_use]
    pub fn ledger_key_path(&self) -> PathBuf {
        let key_file = self
            .ledger
            .key_file
            .clone()
            .unwrap_or_else(default_ledger_key_file);
        self.storage.root.join(key_file)
    }

    /// Directory holding the per-claim vaults.
    #[must_use]
    pub fn vault_root(&self) -> PathBuf {
        self.storage.root.join("vaults")
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AuditConfig::from_toml("").unwrap();
        assert_eq!(config.storage.root, PathBuf::from("audit"));
        assert_eq!(config.ledger.backend, StorageBackend::PlaintextFile);
        assert_eq!(config.ledger_path(), PathBuf::from("audit/decisions.log"));
        assert_eq!(config.ledger_key_path(), PathBuf::from("audit/ledger.key"));
        assert_eq!(config.vault_root(), PathBuf::from("audit/vaults"));
        assert!(!config.tokenizer.categories.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            [storage]
            root = "/var/lib/claimtrail/audit"

            [ledger]
            backend = "encrypted_file"
            file = "decisions.log"
            key_file = "keys/ledger.key"

            [tokenizer]
            exclude_fields = ["claim_number"]
            unmatched = "mask"

            [[tokenizer.categories]]
            name = "person_name"
            vault = true
            patterns = ["_name$"]

            [[tokenizer.categories]]
            name = "payment_card"
            vault = false
            patterns = ["card_number"]
        "#;

        let config = AuditConfig::from_toml(toml).unwrap();
        assert_eq!(config.ledger.backend, StorageBackend::EncryptedFile);
        assert_eq!(
            config.ledger_key_path(),
            PathBuf::from("/var/lib/claimtrail/audit/keys/ledger.key")
        );
        assert_eq!(config.tokenizer.categories.len(), 2);
        assert!(!config.tokenizer.categories[1].vault);
    }

    #[test]
    fn invalid_category_pattern_is_rejected_at_load() {
        let toml = r#"
            [[tokenizer.categories]]
            name = "broken"
            patterns = ["(unclosed"]
        "#;
        let result = AuditConfig::from_toml(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn absolute_ledger_file_is_rejected() {
        let toml = r#"
            [ledger]
            file = "/etc/passwd"
        "#;
        let result = AuditConfig::from_toml(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = AuditConfig::default();
        let rendered = config.to_toml().unwrap();
        let reparsed = AuditConfig::from_toml(&rendered).unwrap();
        assert_eq!(reparsed.ledger.backend, config.ledger.backend);
        assert_eq!(
            reparsed.tokenizer.categories.len(),
            config.tokenizer.categories.len()
        );
    }
}
