//! Tokenization and detokenization of extraction results.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use super::config::{CompiledCategory, TokenizerConfig, TokenizerConfigError, UnmatchedFieldPolicy, MASKED};
use super::extraction::{ExtractedField, ExtractionResult};
use super::token::{replace_embedded, PiiToken};
use crate::vault::{vault_id_for_claim, PiiVaultEntry};

/// Prefix for tokenizer-assigned entry ids.
const ENTRY_ID_PREFIX: &str = "pii_";

/// Output of one tokenization pass.
#[derive(Debug, Clone)]
pub struct TokenizationResult {
    /// The extraction result with protected values replaced by tokens
    /// or masks.
    pub redacted: ExtractionResult,

    /// Vault entries for every tokenized value. Not yet persisted — the
    /// caller stores the batch into the claim's vault.
    pub vault_entries: Vec<PiiVaultEntry>,

    /// Number of fields examined.
    pub fields_scanned: usize,

    /// Number of fields whose values were replaced (vaulted or masked).
    pub fields_tokenized: usize,
}

/// Classifies extracted fields as PII and swaps their values for vault
/// tokens or masks.
///
/// Classification is name-based: the exclusion list is consulted first,
/// then category patterns in configured order, first match winning.
/// Values themselves are never inspected.
pub struct PiiTokenizer {
    categories: Vec<CompiledCategory>,
    exclude_fields: Vec<String>,
    unmatched: UnmatchedFieldPolicy,
}

impl PiiTokenizer {
    /// Builds a tokenizer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any category pattern fails to compile.
    pub fn new(config: &TokenizerConfig) -> Result<Self, TokenizerConfigError> {
        Ok(Self {
            categories: config.compile()?,
            exclude_fields: config
                .exclude_fields
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            unmatched: config.unmatched,
        })
    }

    /// A tokenizer with the crate's default category set.
    ///
    /// # Panics
    ///
    /// Never panics: the default configuration is covered by tests.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(&TokenizerConfig::default()).expect("default tokenizer config must compile")
    }

    /// Redacts an extraction result.
    ///
    /// Excluded fields pass through unchanged. For other fields the
    /// first matching category decides: vault categories mint a
    /// [`PiiVaultEntry`] and substitute its token into the value,
    /// normalized value, and any provenance quote containing the
    /// original substring; mask categories substitute the fixed
    /// [`MASKED`] marker and record nothing. Unmatched fields follow
    /// the configured policy. Never fails: unclassifiable input is
    /// passed through, not rejected.
    #[must_use]
    pub fn tokenize(&self, extraction: &ExtractionResult, run_id: &str) -> TokenizationResult {
        let mut redacted = extraction.clone();
        let mut vault_entries = Vec::new();
        let mut fields_scanned = 0usize;
        let mut fields_tokenized = 0usize;

        let vault_id = extraction.claim_id.as_ref().map(|c| vault_id_for_claim(c));

        for field in &mut redacted.fields {
            fields_scanned += 1;

            if self.is_excluded(&field.name) {
                continue;
            }

            let category = self.categories.iter().find(|c| c.matches(&field.name));
            let Some(category) = category else {
                if self.unmatched == UnmatchedFieldPolicy::Mask && mask_field(field) {
                    fields_tokenized += 1;
                }
                continue;
            };

            if category.vault {
                let Some(vault_id) = vault_id.as_deref() else {
                    // No claim means no vault to own the value; masking
                    // still keeps the PII out of downstream output.
                    warn!(
                        field = %field.name,
                        "extraction has no claim id; masking vault-flagged field"
                    );
                    if mask_field(field) {
                        fields_tokenized += 1;
                    }
                    continue;
                };
                let Some(original_value) = original_value_of(field) else {
                    continue;
                };

                let entry = PiiVaultEntry {
                    entry_id: new_entry_id(),
                    vault_id: vault_id.to_string(),
                    claim_id: extraction.claim_id.clone().unwrap_or_default(),
                    doc_id: Some(extraction.doc_id.clone()),
                    run_id: Some(run_id.to_string()),
                    pii_category: category.name.clone(),
                    field_path: field.name.clone(),
                    original_value: original_value.clone(),
                };
                let token = PiiToken::new(&entry.vault_id, &entry.entry_id).to_string();
                substitute_field(field, &original_value, &token);
                vault_entries.push(entry);
                fields_tokenized += 1;
            } else if mask_field(field) {
                fields_tokenized += 1;
            }
        }

        TokenizationResult {
            redacted,
            vault_entries,
            fields_scanned,
            fields_tokenized,
        }
    }

    fn is_excluded(&self, field_name: &str) -> bool {
        let lowered = field_name.to_lowercase();
        self.exclude_fields.iter().any(|name| *name == lowered)
    }
}

/// Restores vaulted values in a redacted tree.
///
/// Every syntactically valid token whose entry id resolves through
/// `entry_lookup` is replaced with that entry's original value — both
/// whole-string tokens in field values and tokens embedded inside
/// provenance quotes. Unknown and malformed tokens are left untouched;
/// a value is never fabricated.
#[must_use]
pub fn detokenize(
    extraction: &ExtractionResult,
    entry_lookup: &HashMap<String, PiiVaultEntry>,
) -> ExtractionResult {
    let resolve = |token: &PiiToken| {
        entry_lookup
            .get(&token.entry_id)
            .map(|entry| entry.original_value.clone())
    };

    let mut restored = extraction.clone();
    for field in &mut restored.fields {
        if let Some(value) = &field.value {
            field.value = Some(replace_embedded(value, resolve));
        }
        if let Some(normalized) = &field.normalized_value {
            field.normalized_value = Some(replace_embedded(normalized, resolve));
        }
        for quote in &mut field.provenance {
            quote.text_quote = replace_embedded(&quote.text_quote, resolve);
        }
    }
    restored
}

/// Collects every token referenced anywhere in an extraction result.
#[must_use]
pub fn collect_result_tokens(extraction: &ExtractionResult) -> Vec<PiiToken> {
    let mut tokens = Vec::new();
    for field in &extraction.fields {
        if let Some(value) = &field.value {
            tokens.extend(PiiToken::find_all(value));
        }
        if let Some(normalized) = &field.normalized_value {
            tokens.extend(PiiToken::find_all(normalized));
        }
        for quote in &field.provenance {
            tokens.extend(PiiToken::find_all(&quote.text_quote));
        }
    }
    tokens.dedup();
    tokens
}

/// The value a vault entry protects: the raw value, falling back to the
/// normalized one.
fn original_value_of(field: &ExtractedField) -> Option<String> {
    field
        .value
        .clone()
        .or_else(|| field.normalized_value.clone())
        .filter(|value| !value.is_empty())
}

/// Replaces a field's values and quote occurrences with a token.
fn substitute_field(field: &mut ExtractedField, original: &str, replacement: &str) {
    if field.value.is_some() {
        field.value = Some(replacement.to_string());
    }
    if field.normalized_value.is_some() {
        field.normalized_value = Some(replacement.to_string());
    }
    for quote in &mut field.provenance {
        if quote.text_quote.contains(original) {
            quote.text_quote = quote.text_quote.replace(original, replacement);
        }
    }
}

/// Masks a field in place. Returns `false` when there was nothing to
/// mask.
fn mask_field(field: &mut ExtractedField) -> bool {
    let Some(original) = original_value_of(field) else {
        return false;
    };
    substitute_field(field, &original, MASKED);
    true
}

/// Allocates a fresh entry id.
fn new_entry_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{ENTRY_ID_PREFIX}{}", &hex[..12])
}
