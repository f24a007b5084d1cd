//! Decision record model and canonical serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Prefix for ledger-assigned decision ids.
const DECISION_ID_PREFIX: &str = "dec_";

/// The kind of automated (or human) decision being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Document classification outcome.
    Classification,
    /// Field extraction outcome.
    Extraction,
    /// Automated quality-gate pass/fail.
    QualityGate,
    /// Human reviewer action.
    HumanReview,
    /// Manual override of an automated decision.
    Override,
}

/// Who made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// An automated pipeline component.
    System,
    /// A human operator or reviewer.
    Human,
}

/// The acting party behind a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// System or human.
    #[serde(rename = "type")]
    pub actor_type: ActorType,

    /// Stable identifier for the actor (component name, reviewer id).
    pub id: String,
}

impl Actor {
    /// An automated actor.
    #[must_use]
    pub fn system(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::System,
            id: id.into(),
        }
    }

    /// A human actor.
    #[must_use]
    pub fn human(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Human,
            id: id.into(),
        }
    }
}

/// A citation pointing at the source material a decision relied on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCitation {
    /// Document the evidence came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,

    /// Page number within the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Verbatim excerpt supporting the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

/// One business-rule evaluation that contributed to a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrace {
    /// Identifier of the rule that fired.
    pub rule_id: String,

    /// Outcome of the rule ("pass", "fail", "skipped", ...).
    pub result: String,

    /// Optional free-form detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Why a decision was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    /// Human-readable summary.
    pub summary: String,

    /// Confidence in `[0, 1]`.
    pub confidence: f64,

    /// Evidence citations backing the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceCitation>,

    /// Business-rule evaluations that contributed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_traces: Vec<RuleTrace>,

    /// Reference to the LLM call that produced the decision, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_call_id: Option<String>,
}

impl Rationale {
    /// Creates a rationale, clamping confidence into `[0, 1]`.
    #[must_use]
    pub fn new(summary: impl Into<String>, confidence: f64) -> Self {
        Self {
            summary: summary.into(),
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
            rule_traces: Vec::new(),
            llm_call_id: None,
        }
    }

    /// Attaches an evidence citation (builder pattern).
    #[must_use]
    pub fn with_evidence(mut self, citation: EvidenceCitation) -> Self {
        self.evidence.push(citation);
        self
    }

    /// Attaches a rule trace (builder pattern).
    #[must_use]
    pub fn with_rule_trace(mut self, trace: RuleTrace) -> Self {
        self.rule_traces.push(trace);
        self
    }
}

/// One immutable event in the decision ledger.
///
/// `decision_id`, `previous_hash`, and `record_hash` are populated by the
/// ledger on append; a record is never mutated once hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique id, assigned on append when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,

    /// What kind of decision this is.
    pub decision_type: DecisionType,

    /// When the decision was made.
    pub timestamp: DateTime<Utc>,

    /// Claim the decision concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,

    /// Document the decision concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,

    /// Pipeline run that produced the decision, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Why the decision was made.
    pub rationale: Rationale,

    /// Decision-type-specific outcome payload.
    pub outcome: Value,

    /// Who made the decision.
    pub actor: Actor,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,

    /// Hash of the immediately prior record, or the genesis sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,

    /// Hash of this record's canonical serialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_hash: Option<String>,
}

impl DecisionRecord {
    /// Creates an unappended record stamped with the current time.
    #[must_use]
    pub fn new(
        decision_type: DecisionType,
        rationale: Rationale,
        outcome: Value,
        actor: Actor,
    ) -> Self {
        Self {
            decision_id: None,
            decision_type,
            timestamp: Utc::now(),
            claim_id: None,
            doc_id: None,
            run_id: None,
            rationale,
            outcome,
            actor,
            metadata: serde_json::Map::new(),
            previous_hash: None,
            record_hash: None,
        }
    }

    /// Shorthand for a classification decision.
    #[must_use]
    pub fn classification(rationale: Rationale, outcome: Value, actor: Actor) -> Self {
        Self::new(DecisionType::Classification, rationale, outcome, actor)
    }

    /// Shorthand for an extraction decision.
    #[must_use]
    pub fn extraction(rationale: Rationale, outcome: Value, actor: Actor) -> Self {
        Self::new(DecisionType::Extraction, rationale, outcome, actor)
    }

    /// Shorthand for a quality-gate decision.
    #[must_use]
    pub fn quality_gate(rationale: Rationale, outcome: Value, actor: Actor) -> Self {
        Self::new(DecisionType::QualityGate, rationale, outcome, actor)
    }

    /// Shorthand for a human-review decision.
    #[must_use]
    pub fn human_review(rationale: Rationale, outcome: Value, actor: Actor) -> Self {
        Self::new(DecisionType::HumanReview, rationale, outcome, actor)
    }

    /// Shorthand for an override decision.
    #[must_use]
    pub fn override_decision(rationale: Rationale, outcome: Value, actor: Actor) -> Self {
        Self::new(DecisionType::Override, rationale, outcome, actor)
    }

    /// Sets the claim id (builder pattern).
    #[must_use]
    pub fn with_claim_id(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = Some(claim_id.into());
        self
    }

    /// Sets the document id (builder pattern).
    #[must_use]
    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Sets the run id (builder pattern).
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Adds a metadata entry (builder pattern).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Produces the canonical bytes a record's hash commits to.
///
/// Canonical form is the record's JSON value with the `record_hash` field
/// removed, serialized with sorted object keys (the default `serde_json`
/// map ordering). Both append and verification derive the digest through
/// this function, so a record round-tripped through disk re-hashes to the
/// same value.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn canonical_record_bytes(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut canonical = value.clone();
    if let Some(object) = canonical.as_object_mut() {
        object.remove("record_hash");
    }
    serde_json::to_vec(&canonical)
}

/// Allocates a fresh decision id.
#[must_use]
pub fn new_decision_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{DECISION_ID_PREFIX}{}", &hex[..12])
}
