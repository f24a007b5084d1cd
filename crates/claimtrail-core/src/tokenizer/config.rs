//! Tokenizer configuration: PII categories, exclusions, and policies.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed, irreversible redaction marker used by mask categories.
pub const MASKED: &str = "[REDACTED]";

/// Errors compiling a tokenizer configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenizerConfigError {
    /// A category was declared without a name.
    #[error("category at position {position} has an empty name")]
    EmptyCategoryName {
        /// Zero-based position in the category list.
        position: usize,
    },

    /// A category was declared without any patterns.
    #[error("category {name} has no field patterns")]
    EmptyPatternList {
        /// The offending category.
        name: String,
    },

    /// A field pattern failed to compile.
    #[error("invalid pattern {pattern:?} in category {category}: {source}")]
    InvalidPattern {
        /// The category declaring the pattern.
        category: String,
        /// The pattern text.
        pattern: String,
        /// The regex compile error.
        source: regex::Error,
    },
}

/// What to do with a field no category claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedFieldPolicy {
    /// Leave the field unchanged.
    #[default]
    PassThrough,

    /// Replace the value with the fixed redaction marker.
    Mask,
}

/// One named PII category.
///
/// Patterns are regexes tested against field names in declaration order;
/// the first matching category wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiCategoryConfig {
    /// Category name, recorded on every vault entry it produces.
    pub name: String,

    /// Persist matches to the vault (`true`) or mask them in place
    /// (`false`).
    #[serde(default = "default_vault")]
    pub vault: bool,

    /// Ordered field-name patterns.
    pub patterns: Vec<String>,

    /// Whether patterns match case-sensitively.
    #[serde(default)]
    pub case_sensitive: bool,
}

const fn default_vault() -> bool {
    true
}

impl PiiCategoryConfig {
    /// A vaulting category.
    #[must_use]
    pub fn vaulted(name: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            name: name.into(),
            vault: true,
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            case_sensitive: false,
        }
    }

    /// A masking category.
    #[must_use]
    pub fn masked(name: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            name: name.into(),
            vault: false,
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            case_sensitive: false,
        }
    }
}

/// Tokenizer configuration.
///
/// Scalar fields precede `categories` so the struct serializes to TOML
/// with values ahead of the array of tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Field names that are never PII, checked before any category.
    #[serde(default = "default_exclusions")]
    pub exclude_fields: Vec<String>,

    /// Policy for fields matching no category.
    #[serde(default)]
    pub unmatched: UnmatchedFieldPolicy,

    /// Ordered categories; first match wins.
    #[serde(default = "default_categories")]
    pub categories: Vec<PiiCategoryConfig>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            exclude_fields: default_exclusions(),
            unmatched: UnmatchedFieldPolicy::default(),
            categories: default_categories(),
        }
    }
}

/// The categories shipped with the crate.
///
/// Card security data is masked rather than vaulted: it must not be
/// retained even in encrypted form.
fn default_categories() -> Vec<PiiCategoryConfig> {
    vec![
        PiiCategoryConfig::vaulted(
            "person_name",
            &["_name$", "^name$", "claimant", "insured", "beneficiary"],
        ),
        PiiCategoryConfig::vaulted(
            "national_id",
            &["ssn", "social_security", "national_id", "tax_id", "passport"],
        ),
        PiiCategoryConfig::vaulted("date_of_birth", &["dob", "birth_date", "date_of_birth"]),
        PiiCategoryConfig::vaulted("contact", &["email", "phone", "mobile", "fax"]),
        PiiCategoryConfig::vaulted(
            "address",
            &["address", "street", "postal_code", "zip_code"],
        ),
        PiiCategoryConfig::vaulted(
            "bank_account",
            &["iban", "account_number", "routing_number", "swift"],
        ),
        PiiCategoryConfig::masked("payment_card", &["card_number", "^pan$", "cvv", "cvc"]),
    ]
}

/// Field names that look sensitive but identify business objects, not
/// people.
fn default_exclusions() -> Vec<String> {
    ["claim_number", "policy_number", "doc_type", "provider_name"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// A category with its patterns compiled.
#[derive(Debug, Clone)]
pub(super) struct CompiledCategory {
    pub(super) name: String,
    pub(super) vault: bool,
    regexes: Vec<Regex>,
}

impl CompiledCategory {
    pub(super) fn matches(&self, field_name: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(field_name))
    }
}

impl TokenizerConfig {
    /// Compiles every category pattern, failing closed on the first
    /// invalid declaration.
    ///
    /// # Errors
    ///
    /// Returns an error for empty names, empty pattern lists, or
    /// patterns that do not compile.
    pub(super) fn compile(&self) -> Result<Vec<CompiledCategory>, TokenizerConfigError> {
        let mut compiled = Vec::with_capacity(self.categories.len());
        for (position, category) in self.categories.iter().enumerate() {
            if category.name.trim().is_empty() {
                return Err(TokenizerConfigError::EmptyCategoryName { position });
            }
            if category.patterns.is_empty() {
                return Err(TokenizerConfigError::EmptyPatternList {
                    name: category.name.clone(),
                });
            }
            let mut regexes = Vec::with_capacity(category.patterns.len());
            for pattern in &category.patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(!category.case_sensitive)
                    .build()
                    .map_err(|source| TokenizerConfigError::InvalidPattern {
                        category: category.name.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                regexes.push(regex);
            }
            compiled.push(CompiledCategory {
                name: category.name.clone(),
                vault: category.vault,
                regexes,
            });
        }
        Ok(compiled)
    }

    /// Validates the configuration without building a tokenizer.
    ///
    /// # Errors
    ///
    /// Returns the first compile failure.
    pub fn validate(&self) -> Result<(), TokenizerConfigError> {
        self.compile().map(|_| ())
    }
}
