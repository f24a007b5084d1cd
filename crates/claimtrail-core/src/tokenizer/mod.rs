//! PII classification, tokenization, and detokenization.
//!
//! The tokenizer decides which extracted fields are PII — by field name,
//! against an ordered list of category patterns — and replaces their
//! values with indirection tokens before anything downstream sees them:
//!
//! ```text
//! "John Smith"  ->  [PII:vault_CLM001:pii_4f2a91c03b7d]
//! ```
//!
//! Vault-flagged categories mint a [`crate::vault::PiiVaultEntry`] per
//! value (the caller persists the batch into the claim's vault); mask
//! categories substitute an irreversible `[REDACTED]` marker for data
//! that must not be retained at all. [`detokenize`] reverses the
//! substitution for callers with vault access, and only for entries
//! that still resolve — shredded values stay tokens forever.

mod config;
mod engine;
mod extraction;
mod token;

pub use config::{
    PiiCategoryConfig, TokenizerConfig, TokenizerConfigError, UnmatchedFieldPolicy, MASKED,
};
pub use engine::{collect_result_tokens, detokenize, PiiTokenizer, TokenizationResult};
pub use extraction::{ExtractedField, ExtractionResult, ProvenanceQuote};
pub use token::{replace_embedded, PiiToken};
