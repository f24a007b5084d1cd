//! The extraction-result tree consumed from the document pipeline.
//!
//! These shapes mirror what the upstream extraction stage produces:
//! named fields with raw and normalized values, a confidence, a status,
//! and provenance quotes pointing back into the source document. The
//! tokenizer rewrites this tree in place; it never changes its shape.

use serde::{Deserialize, Serialize};

/// A verbatim excerpt locating a field value in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceQuote {
    /// Page the quote was found on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// The quoted source text.
    pub text_quote: String,
}

/// One extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    /// Field name (also its path within the result).
    pub name: String,

    /// Raw extracted value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Canonicalized value, when normalization applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,

    /// Extractor confidence in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Extraction status ("extracted", "missing", "low_confidence", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Source quotes supporting the value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<ProvenanceQuote>,
}

impl ExtractedField {
    /// A field with just a name and a raw value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            normalized_value: None,
            confidence: None,
            status: None,
            provenance: Vec::new(),
        }
    }

    /// Sets the normalized value (builder pattern).
    #[must_use]
    pub fn with_normalized(mut self, normalized: impl Into<String>) -> Self {
        self.normalized_value = Some(normalized.into());
        self
    }

    /// Adds a provenance quote (builder pattern).
    #[must_use]
    pub fn with_quote(mut self, text_quote: impl Into<String>) -> Self {
        self.provenance.push(ProvenanceQuote {
            page: None,
            text_quote: text_quote.into(),
        });
        self
    }
}

/// The full output of extracting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// The extracted document.
    pub doc_id: String,

    /// The claim the document belongs to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,

    /// Extracted fields in document order.
    #[serde(default)]
    pub fields: Vec<ExtractedField>,
}

impl ExtractionResult {
    /// An empty result for a document.
    #[must_use]
    pub fn new(doc_id: impl Into<String>, claim_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            claim_id: Some(claim_id.into()),
            fields: Vec::new(),
        }
    }

    /// Adds a field (builder pattern).
    #[must_use]
    pub fn with_field(mut self, field: ExtractedField) -> Self {
        self.fields.push(field);
        self
    }
}
