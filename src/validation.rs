// Validation layer: typed errors plus focused validate_* functions per domain area.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("postcondition failed: {0}")]
    PostconditionFailed(String),

    #[error("invariant violated: {invariant} ({details})")]
    InvariantViolated { invariant: String, details: String },

    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

/// Accumulates named attributes for a validation failure so error messages
/// carry enough context to debug without re-running the operation.
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn validate(&self, condition: bool, message: &str) -> Result<(), ValidationError> {
        if condition {
            Ok(())
        } else {
            let attrs = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            Err(ValidationError::PreconditionFailed(format!(
                "{}: {} [{}]",
                self.operation, message, attrs
            )))
        }
    }
}

pub mod vocabulary {
    use once_cell::sync::Lazy;
    use regex::Regex;

    use super::ValidationError;

    static VOCAB_IDENTIFIER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("static regex compiles"));

    /// The only safe exception to "no string concatenation in queries": a
    /// relationship label that has passed this check may be interpolated
    /// directly into a Cypher query string (§4.1, §9).
    pub fn is_valid_vocab_identifier(name: &str) -> bool {
        VOCAB_IDENTIFIER.is_match(name)
    }

    pub fn validate_vocab_label(name: &str) -> Result<(), ValidationError> {
        if is_valid_vocab_identifier(name) {
            Ok(())
        } else {
            Err(ValidationError::InvalidInput {
                field: "relationship_type".to_string(),
                reason: format!("'{name}' must match ^[A-Z][A-Z0-9_]*$"),
            })
        }
    }
}

pub mod ontology {
    use crate::types::OntologyLifecycle;

    use super::ValidationError;

    pub fn validate_ingestion_allowed(
        lifecycle: OntologyLifecycle,
    ) -> Result<(), ValidationError> {
        if lifecycle.accepts_ingestion() {
            Ok(())
        } else {
            Err(ValidationError::InvariantViolated {
                invariant: "frozen ontologies reject ingestion".to_string(),
                details: "ontology is frozen".to_string(),
            })
        }
    }

    pub fn validate_lifecycle_transition(
        from: OntologyLifecycle,
        to: OntologyLifecycle,
    ) -> Result<(), ValidationError> {
        use OntologyLifecycle::*;
        let allowed = matches!(
            (from, to),
            (Active, Pinned) | (Active, Frozen) | (Pinned, Active) | (Frozen, Active)
        );
        if allowed || from == to {
            Ok(())
        } else {
            Err(ValidationError::InvariantViolated {
                invariant: "ontology lifecycle transition".to_string(),
                details: format!("{from:?} -> {to:?} is not a permitted transition"),
            })
        }
    }
}

pub mod ingestion {
    use super::ValidationError;

    /// Resource-class bound named in §7: oversized uploads are surfaced, not retried.
    pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

    pub fn validate_upload_size(bytes: usize) -> Result<(), ValidationError> {
        if bytes == 0 {
            return Err(ValidationError::InvalidInput {
                field: "content".to_string(),
                reason: "upload must not be empty".to_string(),
            });
        }
        if bytes > MAX_UPLOAD_BYTES {
            return Err(ValidationError::InvalidInput {
                field: "content".to_string(),
                reason: format!("upload of {bytes} bytes exceeds {MAX_UPLOAD_BYTES} byte limit"),
            });
        }
        Ok(())
    }
}

pub mod embedding {
    use super::ValidationError;

    /// A profile switch that changes vector dimensions requires `force=true`
    /// (§4.2, §6 "Embedding admin").
    pub fn validate_dimension_switch(
        current: usize,
        incoming: usize,
        force: bool,
    ) -> Result<(), ValidationError> {
        if current == incoming || force {
            Ok(())
        } else {
            Err(ValidationError::InvariantViolated {
                invariant: "embedding dimension switch requires force".to_string(),
                details: format!("current={current} incoming={incoming}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_validate_fails_with_attributes() {
        let ctx = ValidationContext::new("test_op").with_attribute("id", 42);
        let err = ctx.validate(false, "must be true").unwrap_err();
        assert!(err.to_string().contains("test_op"));
    }

    #[test]
    fn vocab_identifier_regex() {
        assert!(vocabulary::is_valid_vocab_identifier("SUPPORTS"));
        assert!(!vocabulary::is_valid_vocab_identifier("supports"));
    }

    #[test]
    fn ingestion_upload_bounds() {
        assert!(ingestion::validate_upload_size(0).is_err());
        assert!(ingestion::validate_upload_size(1024).is_ok());
        assert!(ingestion::validate_upload_size(ingestion::MAX_UPLOAD_BYTES + 1).is_err());
    }

    #[test]
    fn dimension_switch_requires_force() {
        assert!(embedding::validate_dimension_switch(384, 768, false).is_err());
        assert!(embedding::validate_dimension_switch(384, 768, true).is_ok());
        assert!(embedding::validate_dimension_switch(384, 384, false).is_ok());
    }
}
