// Validated Types
// Strongly-typed wrappers that enforce graph-domain invariants at construction time.
// A value of one of these types cannot exist in an invalid state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::validation::ValidationError;

macro_rules! uuid_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID, rejecting the nil UUID.
            pub fn from_uuid(id: Uuid) -> Result<Self, ValidationError> {
                if id.is_nil() {
                    return Err(ValidationError::InvalidInput {
                        field: stringify!($name).to_string(),
                        reason: "id must not be nil".to_string(),
                    });
                }
                Ok(Self(id))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

uuid_id!(ConceptId, "concept_");
uuid_id!(SourceId, "source_");
uuid_id!(InstanceId, "instance_");
uuid_id!(OntologyId, "ontology_");
uuid_id!(JobId, "job_");
uuid_id!(ProposalId, "proposal_");

/// `DocumentMeta.document_id` is defined as the content hash, not a random id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_content_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge confidence, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Confidence(f64);

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::InvariantViolated {
                invariant: "0 <= confidence <= 1".to_string(),
                details: format!("got {value}"),
            });
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::CERTAIN
    }
}

/// A relationship-type / VocabType name. Must match `^[A-Z][A-Z0-9_]*$` so it
/// can be safely interpolated as a Cypher relationship label (see
/// `store::base::validate_vocab_label`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VocabName(String);

impl VocabName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if !crate::validation::vocabulary::is_valid_vocab_identifier(&name) {
            return Err(ValidationError::InvalidInput {
                field: "vocab_name".to_string(),
                reason: format!("'{name}' does not match ^[A-Z][A-Z0-9_]*$"),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VocabName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The global monotonic ingestion epoch (`graph_metrics.document_ingestion_counter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Epoch(pub i64);

impl Epoch {
    pub fn delta(&self, since: Epoch) -> i64 {
        self.0 - since.0
    }
}

/// One of the 11 fixed relationship categories (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabCategory {
    Causation,
    Composition,
    Logical,
    Evidential,
    Semantic,
    Temporal,
    Dependency,
    Derivation,
    Operation,
    Interaction,
    Modification,
}

impl VocabCategory {
    pub const ALL: [VocabCategory; 11] = [
        VocabCategory::Causation,
        VocabCategory::Composition,
        VocabCategory::Logical,
        VocabCategory::Evidential,
        VocabCategory::Semantic,
        VocabCategory::Temporal,
        VocabCategory::Dependency,
        VocabCategory::Derivation,
        VocabCategory::Operation,
        VocabCategory::Interaction,
        VocabCategory::Modification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VocabCategory::Causation => "causation",
            VocabCategory::Composition => "composition",
            VocabCategory::Logical => "logical",
            VocabCategory::Evidential => "evidential",
            VocabCategory::Semantic => "semantic",
            VocabCategory::Temporal => "temporal",
            VocabCategory::Dependency => "dependency",
            VocabCategory::Derivation => "derivation",
            VocabCategory::Operation => "operation",
            VocabCategory::Interaction => "interaction",
            VocabCategory::Modification => "modification",
        }
    }
}

impl fmt::Display for VocabCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a VocabType's category assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    AssignedAtCreation,
    Computed,
}

/// Ontology lifecycle state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OntologyLifecycle {
    Active,
    Pinned,
    Frozen,
}

impl OntologyLifecycle {
    /// Frozen ontologies reject ingestion; pinned and active both allow it.
    pub fn accepts_ingestion(&self) -> bool {
        !matches!(self, OntologyLifecycle::Frozen)
    }
}

/// `Source.content_type` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Document,
    Image,
    Synthetic,
}

/// Provenance of a `Concept -[rel]-> Concept` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    LlmExtraction,
    HumanCuration,
}

/// Direction semantics recorded on a VocabType.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSemantics {
    Outward,
    Inward,
    Bidirectional,
}

/// The 7-state epistemic classification (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EpistemicStatus {
    WellGrounded,
    MixedGrounding,
    WeakGrounding,
    PoorlyGrounded,
    Contradicted,
    Historical,
    InsufficientData,
}

/// `kg_api.annealing_proposals.kind` (§4.6): the three adjustments a
/// breathing cycle may suggest for a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    Promote,
    Demote,
    Merge,
}

/// Review state machine (§4.6): `pending -> approved | rejected`, then
/// `executed`. Autonomous mode collapses `pending -> approved -> executed`
/// within one breathing cycle; HITL mode stops at `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
}

/// Validated chunk word-count policy (§4.4): `min = 0.8*target`, `max = 1.5*target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkWordCounts {
    pub target_words: u32,
    pub min_words: u32,
    pub max_words: u32,
    pub overlap_words: u32,
}

impl ChunkWordCounts {
    pub const TARGET_RANGE: (u32, u32) = (100, 5000);
    pub const OVERLAP_RANGE: (u32, u32) = (0, 1000);

    pub fn new(target_words: u32, overlap_words: u32) -> Result<Self, ValidationError> {
        let (lo, hi) = Self::TARGET_RANGE;
        if !(lo..=hi).contains(&target_words) {
            return Err(ValidationError::InvalidInput {
                field: "target_words".to_string(),
                reason: format!("must be in [{lo}, {hi}], got {target_words}"),
            });
        }
        let (olo, ohi) = Self::OVERLAP_RANGE;
        if !(olo..=ohi).contains(&overlap_words) {
            return Err(ValidationError::InvalidInput {
                field: "overlap_words".to_string(),
                reason: format!("must be in [{olo}, {ohi}], got {overlap_words}"),
            });
        }
        Ok(Self {
            target_words,
            min_words: (target_words as f64 * 0.8) as u32,
            max_words: (target_words as f64 * 1.5) as u32,
            overlap_words,
        })
    }
}

impl Default for ChunkWordCounts {
    fn default() -> Self {
        Self::new(1000, 200).expect("defaults are always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rejects_out_of_range() {
        assert!(Confidence::new(-0.01).is_err());
        assert!(Confidence::new(1.01).is_err());
        assert!(Confidence::new(0.0).is_ok());
        assert!(Confidence::new(1.0).is_ok());
    }

    #[test]
    fn vocab_name_enforces_regex() {
        assert!(VocabName::new("SUPPORTS").is_ok());
        assert!(VocabName::new("OPTIMIZES_FOR").is_ok());
        assert!(VocabName::new("supports").is_err());
        assert!(VocabName::new("1SUPPORTS").is_err());
        assert!(VocabName::new("SUPPORTS-X").is_err());
    }

    #[test]
    fn concept_id_rejects_nil() {
        assert!(ConceptId::from_uuid(Uuid::nil()).is_err());
        assert!(ConceptId::from_uuid(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn chunk_word_counts_derives_min_max() {
        let c = ChunkWordCounts::new(1000, 200).unwrap();
        assert_eq!(c.min_words, 800);
        assert_eq!(c.max_words, 1500);
        assert!(ChunkWordCounts::new(50, 200).is_err());
        assert!(ChunkWordCounts::new(1000, 2000).is_err());
    }

    #[test]
    fn ontology_lifecycle_gates_ingestion() {
        assert!(OntologyLifecycle::Active.accepts_ingestion());
        assert!(OntologyLifecycle::Pinned.accepts_ingestion());
        assert!(!OntologyLifecycle::Frozen.accepts_ingestion());
    }
}
