// Ingestion pipeline (§4.4): dedupe -> chunk -> serial per-chunk extraction
// -> concept matching -> instance/relationship creation -> DocumentMeta +
// epoch. Grounded on `supabase_repository/job_worker.rs`'s `process_job`
// shape (`#[instrument(skip_all)]`, cancellation-aware long job) and the
// exact constants from `original_source/api/app/services/concept_service.py`
// (`MATCH_THRESHOLD = 0.85`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::ai_provider::{AiProvider, AiProviderError, ExtractionRequest, KnownConcept};
use crate::embeddings::{EmbeddingError, EmbeddingService};
use crate::pure::chunking::chunk_text;
use crate::pure::stemming::find_stem_match;
use crate::store::{GraphStore, StoreError};
use crate::types::{ChunkWordCounts, ConceptId, ContentType, DocumentId, EdgeSource, SourceId, ValidationError};

pub const MATCH_THRESHOLD: f32 = 0.85;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("ai provider error: {0}")]
    AiProvider(#[from] AiProviderError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("ontology {0} is frozen and refuses ingestion")]
    OntologyFrozen(String),
    #[error("parallel chunk processing is not implemented; serial is the only supported mode")]
    ParallelModeUnsupported,
}

/// §9 Open Question 1: serial is the only implemented execution path.
/// `Parallel` is a typed placeholder that errors rather than silently
/// degrading concept-matching quality by racing chunks against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkProcessingMode {
    #[default]
    Serial,
    Parallel,
}

pub struct IngestionOptions {
    pub ontology: String,
    pub filename: Option<String>,
    pub force: bool,
    pub chunk_policy: ChunkWordCounts,
    pub chunk_processing_mode: ChunkProcessingMode,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub document_id: DocumentId,
    pub epoch: i64,
    pub source_count: usize,
    pub concept_count: usize,
    pub instance_count: usize,
    pub reused_existing: bool,
}

pub struct IngestionPipeline {
    store: Arc<GraphStore>,
    embeddings: Arc<EmbeddingService>,
    ai_provider: Arc<dyn AiProvider>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<GraphStore>, embeddings: Arc<EmbeddingService>, ai_provider: Arc<dyn AiProvider>) -> Self {
        Self {
            store,
            embeddings,
            ai_provider,
        }
    }

    /// §4.4 step 1: content hash and dedupe; returns the existing document
    /// info when `force` is false and the hash is already ingested into
    /// this ontology.
    #[instrument(skip(self, content))]
    pub async fn run(
        &self,
        content: &str,
        options: IngestionOptions,
        cancel: &AtomicBool,
    ) -> Result<IngestionOutcome, IngestionError> {
        if options.chunk_processing_mode == ChunkProcessingMode::Parallel {
            return Err(IngestionError::ParallelModeUnsupported);
        }

        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));

        if !options.force {
            if let Some(existing) = self.store.find_document_meta(&content_hash, &options.ontology).await? {
                return Ok(IngestionOutcome {
                    document_id: DocumentId::from_content_hash(existing.document_id),
                    epoch: self.store.current_epoch().await?,
                    source_count: existing.source_count as usize,
                    concept_count: 0,
                    instance_count: 0,
                    reused_existing: true,
                });
            }
        }

        let ontology = self
            .store
            .get_or_create_ontology(&options.ontology, None, None)
            .await?;
        if matches!(ontology.lifecycle(), crate::types::OntologyLifecycle::Frozen) {
            return Err(IngestionError::OntologyFrozen(options.ontology.clone()));
        }

        let chunks = chunk_text(content, options.chunk_policy);
        let mut source_ids = Vec::with_capacity(chunks.len());
        let mut known_concepts: Vec<KnownConcept> = Vec::new();
        let mut total_concepts = 0usize;
        let mut total_instances = 0usize;
        let current_epoch = self.store.current_epoch().await?;

        for (chunk_index, chunk_text_content) in chunks.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                warn!(chunk_index, "ingestion cancelled between chunks, partial graph retained");
                break;
            }

            let offset_start = content.find(chunk_text_content.as_str()).unwrap_or(0) as i64;
            let source = self
                .store
                .create_source(crate::store::ingestion::NewSource {
                    ontology: &options.ontology,
                    chunk_index: chunk_index as i32,
                    full_text: chunk_text_content,
                    content_type: ContentType::Document,
                    content_hash: &content_hash,
                    char_offset_start: offset_start,
                    char_offset_end: offset_start + chunk_text_content.len() as i64,
                })
                .await?;
            let source_id = SourceId::from_uuid(source.source_id)?;
            source_ids.push(source_id);

            let (concepts_created, instances_created) = self
                .process_chunk(
                    chunk_text_content,
                    &options.ontology,
                    source_id,
                    &mut known_concepts,
                    current_epoch,
                    options.job_id,
                    &content_hash,
                )
                .await?;
            total_concepts += concepts_created;
            total_instances += instances_created;
        }

        let (meta, epoch) = self
            .store
            .write_document_meta_and_advance_epoch(
                &DocumentId::from_content_hash(content_hash.clone()),
                &options.ontology,
                options.filename.as_deref(),
                &source_ids,
                options.job_id,
            )
            .await?;

        info!(
            document_id = %meta.document_id,
            epoch,
            sources = source_ids.len(),
            concepts = total_concepts,
            "ingestion complete"
        );

        Ok(IngestionOutcome {
            document_id: DocumentId::from_content_hash(meta.document_id),
            epoch,
            source_count: source_ids.len(),
            concept_count: total_concepts,
            instance_count: total_instances,
            reused_existing: false,
        })
    }

    /// One chunk's LLM round-trip plus concept match/create, instance
    /// dedup, and relationship creation (§4.4 step 3).
    #[allow(clippy::too_many_arguments)]
    async fn process_chunk(
        &self,
        chunk_text: &str,
        ontology: &str,
        source_id: SourceId,
        known_concepts: &mut Vec<KnownConcept>,
        epoch: i64,
        job_id: Option<Uuid>,
        document_id: &str,
    ) -> Result<(usize, usize), IngestionError> {
        let extraction = self
            .ai_provider
            .extract_concepts(ExtractionRequest {
                chunk_text: chunk_text.to_string(),
                known_concepts: known_concepts.clone(),
                ontology: ontology.to_string(),
            })
            .await?;

        let mut resolved: std::collections::HashMap<String, ConceptId> = std::collections::HashMap::new();
        let mut concepts_created = 0usize;

        for candidate in &extraction.concepts {
            let embedding = self.embeddings.embed(&candidate.label).await?;
            let matches = self
                .store
                .find_similar_concepts(ontology, &embedding.vector, MATCH_THRESHOLD)
                .await?;

            let concept_id = if let Some(best) = matches.first() {
                self.store.touch_concept(best.concept_id, epoch).await?;
                best.concept_id
            } else {
                let id = self
                    .store
                    .create_concept(
                        ontology,
                        &candidate.label,
                        candidate.description.as_deref(),
                        &embedding.vector,
                        &candidate.search_terms,
                        epoch,
                        Some("llm_extraction"),
                    )
                    .await?;
                concepts_created += 1;
                known_concepts.push(KnownConcept {
                    concept_id: id.as_uuid().to_string(),
                    label: candidate.label.clone(),
                });
                id
            };

            let key = candidate.concept_id.clone().unwrap_or_else(|| candidate.label.clone());
            resolved.insert(key, concept_id);
        }

        let mut instances_created = 0usize;
        for instance in &extraction.instances {
            if let Some(&concept_id) = resolved.get(&instance.concept_id) {
                self.store.get_or_create_instance(concept_id, source_id, &instance.quote).await?;
                instances_created += 1;
            }
        }

        let existing_vocab_names: Vec<String> = self
            .store
            .list_vocab_types()
            .await?
            .into_iter()
            .map(|v| v.relationship_type)
            .collect();

        for relationship in &extraction.relationships {
            let (Some(&from), Some(&to)) = (
                resolved.get(&relationship.from_concept_id),
                resolved.get(&relationship.to_concept_id),
            ) else {
                warn!(
                    from = %relationship.from_concept_id,
                    to = %relationship.to_concept_id,
                    "skipping relationship referencing unresolved concept"
                );
                continue;
            };

            let candidate_label = relationship.relationship_type.trim().to_uppercase();
            let vocab_name = find_stem_match(&candidate_label, &existing_vocab_names)
                .map(|s| s.to_string())
                .unwrap_or(candidate_label);

            if crate::types::VocabName::new(&vocab_name).is_err() {
                warn!(vocab_name = %vocab_name, "skipping relationship with unregisterable label");
                continue;
            }

            self.store
                .create_relationship_edge(
                    from,
                    to,
                    &vocab_name,
                    relationship.confidence,
                    relationship.category.as_deref().unwrap_or("semantic"),
                    edge_source_str(EdgeSource::LlmExtraction),
                    job_id,
                    Some(document_id),
                )
                .await?;
            self.store
                .increment_usage_count(&crate::types::VocabName::new(&vocab_name)?)
                .await?;
        }

        Ok((concepts_created, instances_created))
    }
}

fn edge_source_str(source: EdgeSource) -> &'static str {
    match source {
        EdgeSource::LlmExtraction => "llm_extraction",
        EdgeSource::HumanCuration => "human_curation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_threshold_is_the_spec_constant() {
        assert_eq!(MATCH_THRESHOLD, 0.85);
    }

    #[test]
    fn edge_source_strings_round_trip() {
        assert_eq!(edge_source_str(EdgeSource::LlmExtraction), "llm_extraction");
        assert_eq!(edge_source_str(EdgeSource::HumanCuration), "human_curation");
    }

    #[test]
    fn chunk_processing_mode_defaults_to_serial() {
        assert_eq!(ChunkProcessingMode::default(), ChunkProcessingMode::Serial);
    }
}
