// Fluent builders for the four entity kinds ingestion and admin surfaces
// construct (§3, §4.1, §4.3): `Concept`, `Source`, `Ontology`, `VocabType`.
// Grounded on `kotadb-kota-db/src/builders.rs`'s `DocumentBuilder`/
// `QueryBuilder` pattern: `Result`-returning setters for validated fields,
// a plain value type out of `build()`, no I/O performed by the builder
// itself -- persistence is a separate call against `GraphStore`.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::types::{CategorySource, ContentType, DirectionSemantics, VocabCategory, VocabName};

/// Validated draft for `GraphStore::create_concept`.
#[derive(Debug, Clone)]
pub struct NewConceptDraft {
    pub ontology: String,
    pub label: String,
    pub description: Option<String>,
    pub search_terms: Vec<String>,
    pub embedding: Option<Vec<f32>>,
    pub creation_method: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConceptBuilder {
    ontology: Option<String>,
    label: Option<String>,
    description: Option<String>,
    search_terms: Vec<String>,
    embedding: Option<Vec<f32>>,
    creation_method: Option<String>,
}

impl ConceptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ontology(mut self, ontology: impl Into<String>) -> Self {
        self.ontology = Some(ontology.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(anyhow!("concept label cannot be empty"));
        }
        self.label = Some(label);
        Ok(self)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn search_term(mut self, term: impl Into<String>) -> Self {
        self.search_terms.push(term.into());
        self
    }

    pub fn search_terms(mut self, terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.search_terms.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn creation_method(mut self, method: impl Into<String>) -> Self {
        self.creation_method = Some(method.into());
        self
    }

    pub fn build(self) -> Result<NewConceptDraft> {
        let ontology = self.ontology.ok_or_else(|| anyhow!("concept ontology is required"))?;
        let label = self.label.ok_or_else(|| anyhow!("concept label is required"))?;
        Ok(NewConceptDraft {
            ontology,
            label,
            description: self.description,
            search_terms: self.search_terms,
            embedding: self.embedding,
            creation_method: self.creation_method,
        })
    }
}

/// Validated draft for `GraphStore::create_source`, owning its text rather
/// than borrowing it the way `store::ingestion::NewSource<'a>` does, since a
/// builder outlives the caller's buffer.
#[derive(Debug, Clone)]
pub struct NewSourceDraft {
    pub ontology: String,
    pub chunk_index: i32,
    pub full_text: String,
    pub content_type: ContentType,
    pub content_hash: String,
    pub char_offset_start: i64,
    pub char_offset_end: i64,
}

#[derive(Debug)]
pub struct SourceBuilder {
    ontology: Option<String>,
    chunk_index: i32,
    full_text: Option<String>,
    content_type: ContentType,
    content_hash: Option<String>,
    char_offset_start: i64,
    char_offset_end: i64,
}

impl Default for SourceBuilder {
    fn default() -> Self {
        Self {
            ontology: None,
            chunk_index: 0,
            full_text: None,
            content_type: ContentType::Document,
            content_hash: None,
            char_offset_start: 0,
            char_offset_end: 0,
        }
    }
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ontology(mut self, ontology: impl Into<String>) -> Self {
        self.ontology = Some(ontology.into());
        self
    }

    pub fn chunk_index(mut self, index: i32) -> Self {
        self.chunk_index = index;
        self
    }

    pub fn full_text(mut self, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(anyhow!("source full_text cannot be empty"));
        }
        self.full_text = Some(text);
        Ok(self)
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// A synthetic Source written for provenance on programmatic concept
    /// creation (§6: "A synthetic Source ... is written for provenance").
    pub fn synthetic(mut self) -> Self {
        self.content_type = ContentType::Synthetic;
        self
    }

    pub fn offsets(mut self, start: i64, end: i64) -> Result<Self> {
        if end < start {
            return Err(anyhow!("char_offset_end must be >= char_offset_start"));
        }
        self.char_offset_start = start;
        self.char_offset_end = end;
        Ok(self)
    }

    pub fn content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn build(self) -> Result<NewSourceDraft> {
        let ontology = self.ontology.ok_or_else(|| anyhow!("source ontology is required"))?;
        let full_text = self.full_text.ok_or_else(|| anyhow!("source full_text is required"))?;
        let content_hash = self.content_hash.unwrap_or_else(|| hex::encode(Sha256::digest(full_text.as_bytes())));

        Ok(NewSourceDraft {
            ontology,
            chunk_index: self.chunk_index,
            full_text,
            content_type: self.content_type,
            content_hash,
            char_offset_start: self.char_offset_start,
            char_offset_end: self.char_offset_end,
        })
    }
}

/// Validated draft for `GraphStore::get_or_create_ontology`.
#[derive(Debug, Clone)]
pub struct NewOntologyDraft {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Default)]
pub struct OntologyBuilder {
    name: Option<String>,
    description: Option<String>,
    created_by: Option<String>,
}

impl OntologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(anyhow!("ontology name cannot be empty"));
        }
        self.name = Some(name);
        Ok(self)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.created_by = Some(creator.into());
        self
    }

    pub fn build(self) -> Result<NewOntologyDraft> {
        let name = self.name.ok_or_else(|| anyhow!("ontology name is required"))?;
        Ok(NewOntologyDraft {
            name,
            description: self.description,
            created_by: self.created_by,
        })
    }
}

/// Validated draft for `GraphStore::get_or_create_vocab_type`.
#[derive(Debug, Clone)]
pub struct NewVocabTypeDraft {
    pub name: VocabName,
    pub description: Option<String>,
    pub category: VocabCategory,
    pub category_source: CategorySource,
    pub is_builtin: bool,
    pub direction: DirectionSemantics,
}

#[derive(Debug)]
pub struct VocabTypeBuilder {
    name: Option<String>,
    description: Option<String>,
    category: Option<VocabCategory>,
    category_source: CategorySource,
    is_builtin: bool,
    direction: DirectionSemantics,
}

impl Default for VocabTypeBuilder {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            category: None,
            category_source: CategorySource::AssignedAtCreation,
            is_builtin: false,
            direction: DirectionSemantics::Outward,
        }
    }
}

impl VocabTypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must match `^[A-Z][A-Z0-9_]*$`, checked by `build()` so a malformed
    /// name never reaches a Cypher label position (§4.1 injection defense).
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        self.name = Some(name.into());
        Ok(self)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: VocabCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// A category computed by the breathing cycle rather than assigned at
    /// creation time (§4.3's `CategorySource::Computed`).
    pub fn computed_category(mut self, category: VocabCategory) -> Self {
        self.category = Some(category);
        self.category_source = CategorySource::Computed;
        self
    }

    pub fn builtin(mut self) -> Self {
        self.is_builtin = true;
        self
    }

    pub fn direction(mut self, direction: DirectionSemantics) -> Self {
        self.direction = direction;
        self
    }

    pub fn build(self) -> Result<NewVocabTypeDraft> {
        let raw_name = self.name.ok_or_else(|| anyhow!("vocab type name is required"))?;
        let name = VocabName::new(raw_name)?;
        let category = self.category.ok_or_else(|| anyhow!("vocab type category is required"))?;
        Ok(NewVocabTypeDraft {
            name,
            description: self.description,
            category,
            category_source: self.category_source,
            is_builtin: self.is_builtin,
            direction: self.direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_builder_requires_ontology_and_label() {
        assert!(ConceptBuilder::new().build().is_err());
        assert!(ConceptBuilder::new().ontology("physics").build().is_err());
    }

    #[test]
    fn concept_builder_rejects_empty_label() {
        assert!(ConceptBuilder::new().label("   ").is_err());
    }

    #[test]
    fn concept_builder_succeeds_with_required_fields() {
        let draft = ConceptBuilder::new()
            .ontology("physics")
            .label("entropy")
            .unwrap()
            .search_term("disorder")
            .build()
            .unwrap();
        assert_eq!(draft.ontology, "physics");
        assert_eq!(draft.search_terms, vec!["disorder".to_string()]);
    }

    #[test]
    fn source_builder_rejects_inverted_offsets() {
        assert!(SourceBuilder::new().offsets(100, 10).is_err());
    }

    #[test]
    fn source_builder_marks_synthetic_content_type() {
        let draft = SourceBuilder::new()
            .ontology("physics")
            .full_text("programmatically created")
            .unwrap()
            .synthetic()
            .build()
            .unwrap();
        assert_eq!(draft.content_type, ContentType::Synthetic);
    }

    #[test]
    fn source_builder_derives_content_hash_when_omitted() {
        let draft = SourceBuilder::new().ontology("physics").full_text("hello").unwrap().build().unwrap();
        assert_eq!(draft.content_hash.len(), 64);
    }

    #[test]
    fn ontology_builder_rejects_empty_name() {
        assert!(OntologyBuilder::new().name("  ").is_err());
    }

    #[test]
    fn vocab_type_builder_rejects_lowercase_names() {
        let result = VocabTypeBuilder::new().name("causes").unwrap().category(VocabCategory::Causation).build();
        assert!(result.is_err());
    }

    #[test]
    fn vocab_type_builder_succeeds_for_a_valid_identifier() {
        let draft = VocabTypeBuilder::new()
            .name("CAUSES")
            .unwrap()
            .category(VocabCategory::Causation)
            .builtin()
            .build()
            .unwrap();
        assert_eq!(draft.name.as_str(), "CAUSES");
        assert!(draft.is_builtin);
    }

    #[test]
    fn computed_category_sets_the_computed_source() {
        let draft = VocabTypeBuilder::new()
            .name("IMPLIES")
            .unwrap()
            .computed_category(VocabCategory::Logical)
            .build()
            .unwrap();
        assert_eq!(draft.category_source, CategorySource::Computed);
    }
}
