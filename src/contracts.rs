// External interface contracts (§6). Plain `serde` DTOs for the surfaces a
// boundary adapter (HTTP, gRPC, whatever) would expose, plus the thin
// wiring that turns a request DTO into a call against the core components
// -- this module owns no router, mirroring the teacher's own separation of
// `contracts.rs` request/response shapes from `http_server.rs`'s axum glue,
// except here the glue layer does not exist at all.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::embeddings::EmbeddingService;
use crate::grounding::{GroundingEngine, GroundingError};
use crate::ingestion::{ChunkProcessingMode, IngestionError, IngestionOptions, IngestionOutcome, IngestionPipeline, MATCH_THRESHOLD};
use crate::jobs::{Job, JobQueue, JobQueueError};
use crate::store::{ConceptMatch, GraphStore, StoreError};
use crate::types::{ChunkWordCounts, EpistemicStatus, JobId, ValidationError, VocabCategory, VocabName};
use crate::vocabulary::{VocabularyError, VocabularyManager};

/// `POST /ingest` body (§6 "Ingestion submission").
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub ontology: String,
    pub filename: Option<String>,
    pub content: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub options: IngestOptionsDto,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestOptionsDto {
    pub target_words: Option<u32>,
    pub overlap_words: Option<u32>,
}

/// Response on both fresh ingestion and dedupe-hit (§6: "Response on
/// duplicate includes the existing job id and a suggestion to use `force`").
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub document_id: String,
    pub epoch: i64,
    pub source_count: usize,
    pub concept_count: usize,
    pub instance_count: usize,
    pub reused_existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_with_force_hint: Option<String>,
}

impl From<IngestionOutcome> for IngestResponse {
    fn from(outcome: IngestionOutcome) -> Self {
        let retry_with_force_hint = outcome
            .reused_existing
            .then(|| "this content was already ingested into this ontology; pass force=true to re-ingest".to_string());
        Self {
            document_id: outcome.document_id.as_str().to_string(),
            epoch: outcome.epoch,
            source_count: outcome.source_count,
            concept_count: outcome.concept_count,
            instance_count: outcome.instance_count,
            reused_existing: outcome.reused_existing,
            retry_with_force_hint,
        }
    }
}

/// Runs an ingestion request against the pipeline, translating the DTO's
/// chunk-size hints into `ChunkWordCounts` and falling back to its defaults
/// when the caller omits them.
pub async fn handle_ingest(
    pipeline: &IngestionPipeline,
    request: IngestRequest,
    job_id: Option<uuid::Uuid>,
    cancel: &std::sync::atomic::AtomicBool,
) -> Result<IngestResponse, IngestionError> {
    let chunk_policy = match (request.options.target_words, request.options.overlap_words) {
        (Some(target), Some(overlap)) => ChunkWordCounts::new(target, overlap)?,
        _ => ChunkWordCounts::default(),
    };

    let options = IngestionOptions {
        ontology: request.ontology,
        filename: request.filename,
        force: request.force,
        chunk_policy,
        chunk_processing_mode: ChunkProcessingMode::Serial,
        job_id,
    };

    pipeline.run(&request.content, options, cancel).await.map(IngestResponse::from)
}

/// `GET /jobs/{id}` (§6 "Job observability").
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub job_type: String,
    pub status: String,
    pub attempt: i32,
    pub max_retries: i32,
    pub stages: JsonValue,
    pub error_message: Option<String>,
    pub result: Option<JsonValue>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            job_type: job.job_type,
            status: job.status.as_str().to_string(),
            attempt: job.attempt,
            max_retries: job.max_retries,
            stages: serde_json::to_value(&job.stages).unwrap_or(JsonValue::Null),
            error_message: job.error_message,
            result: job.result,
        }
    }
}

pub async fn handle_job_status(queue: &JobQueue, job_id: JobId) -> Result<Option<JobStatusResponse>, JobQueueError> {
    Ok(queue.get_job(job_id).await?.map(JobStatusResponse::from))
}

/// `POST /query/search` (§6 "Search").
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub ontology: Option<String>,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_min_similarity() -> f32 {
    MATCH_THRESHOLD
}

fn default_search_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub concept_id: String,
    pub label: String,
    pub description: Option<String>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding error: {0}")]
    Embedding(#[from] crate::embeddings::EmbeddingError),
}

/// Embeds the query text and scores it against every concept in `ontology`
/// by cosine similarity, matching `find_similar_concepts`'s "fetch
/// candidates, score in Rust" approach (no DB-side vector index).
pub async fn handle_search(
    store: &GraphStore,
    embeddings: &EmbeddingService,
    request: SearchRequest,
) -> Result<SearchResponse, SearchError> {
    let ontology = request.ontology.as_deref().unwrap_or("default");
    let query_embedding = embeddings.embed(&request.query).await?;
    let mut matches = store
        .find_similar_concepts(ontology, &query_embedding.vector, request.min_similarity)
        .await?;
    matches.truncate(request.limit);

    let mut hits = Vec::with_capacity(matches.len());
    for ConceptMatch { concept_id, similarity } in matches {
        let Some(row) = store.get_concept(concept_id).await? else { continue };
        hits.push(SearchHit {
            concept_id: concept_id.to_string(),
            label: row.label,
            description: row.description,
            score: similarity,
        });
    }

    Ok(SearchResponse { hits })
}

/// `POST /concepts` (§6 "Concept CRUD"): how a caller asks for a new concept
/// to be matched against, or added to, an ontology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// Match an existing concept above threshold; otherwise create.
    Auto,
    /// Only ever match; the caller treats "no match" as a miss.
    MatchOnly,
    /// Always create a new concept regardless of existing matches.
    CreateAlways,
}

#[derive(Debug, Deserialize)]
pub struct ConceptCreateRequest {
    pub ontology: String,
    pub label: String,
    pub search_terms: Vec<String>,
    pub description: Option<String>,
    #[serde(default = "default_matching_mode")]
    pub matching_mode: MatchingMode,
}

fn default_matching_mode() -> MatchingMode {
    MatchingMode::Auto
}

#[derive(Debug, Clone, Serialize)]
pub struct ConceptCreateResponse {
    pub concept_id: String,
    pub matched_existing: bool,
}

/// `GET/POST/... /vocabulary` (§6 "Vocabulary admin").
#[derive(Debug, Clone, Serialize)]
pub struct VocabTypeDto {
    pub relationship_type: String,
    pub description: Option<String>,
    pub category: Option<VocabCategory>,
    pub category_source: String,
    pub is_active: bool,
    pub is_builtin: bool,
    pub usage_count: i64,
    pub epistemic_status: Option<EpistemicStatus>,
}

#[derive(Debug, Deserialize)]
pub struct VocabMergeRequest {
    pub deprecated: String,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VocabMergeResponse {
    pub edges_migrated: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum VocabAdminError {
    #[error("vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

pub async fn handle_vocab_list(store: &GraphStore) -> Result<Vec<VocabTypeDto>, StoreError> {
    let rows = store.list_vocab_types().await?;
    Ok(rows
        .iter()
        .map(|row| VocabTypeDto {
            relationship_type: row.relationship_type.clone(),
            description: row.description.clone(),
            category: row.category(),
            category_source: row.category_source.clone(),
            is_active: row.is_active,
            is_builtin: row.is_builtin,
            usage_count: row.usage_count,
            epistemic_status: row.epistemic_status(),
        })
        .collect())
}

pub async fn handle_vocab_merge(
    manager: &VocabularyManager,
    request: VocabMergeRequest,
) -> Result<VocabMergeResponse, VocabAdminError> {
    let deprecated = VocabName::new(request.deprecated)?;
    let target = VocabName::new(request.target)?;
    let edges_migrated = manager.merge(&deprecated, &target, &request.reason).await?;
    Ok(VocabMergeResponse { edges_migrated })
}

pub async fn handle_vocab_sync_missing(manager: &VocabularyManager) -> Result<Vec<String>, VocabularyError> {
    manager.sync_missing().await
}

/// `GET/POST /embeddings` (§6 "Embedding admin").
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingProfileDto {
    pub model_name: String,
    pub dimension: usize,
    pub max_batch_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingActivateRequest {
    pub profile_name: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingActivateResponse {
    pub previous: EmbeddingProfileDto,
    pub current: EmbeddingProfileDto,
    pub dimension_changed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingAdminError {
    #[error("activating profile '{profile_name}' would change the embedding dimension from {from} to {to}; pass force=true to proceed")]
    DimensionMismatch { profile_name: String, from: usize, to: usize },
}

/// Swaps the active embedding provider, refusing a silent dimension change
/// unless the caller opts in with `force` (§6: "dimension-mismatch safety").
pub fn handle_embedding_activate(
    service: &EmbeddingService,
    provider: Arc<dyn crate::embeddings::EmbeddingProvider>,
    request: &EmbeddingActivateRequest,
) -> Result<EmbeddingActivateResponse, EmbeddingAdminError> {
    let previous = service.config();
    let candidate = provider.config();
    if !request.force && candidate.dimension != previous.dimension {
        return Err(EmbeddingAdminError::DimensionMismatch {
            profile_name: request.profile_name.clone(),
            from: previous.dimension,
            to: candidate.dimension,
        });
    }

    let outcome = service.swap_profile(provider);
    Ok(EmbeddingActivateResponse {
        previous: EmbeddingProfileDto {
            model_name: outcome.previous.model_name,
            dimension: outcome.previous.dimension,
            max_batch_size: outcome.previous.max_batch_size,
        },
        current: EmbeddingProfileDto {
            model_name: outcome.current.model_name,
            dimension: outcome.current.dimension,
            max_batch_size: outcome.current.max_batch_size,
        },
        dimension_changed: outcome.dimension_changed,
    })
}

/// Epistemic measurement read surface backing vocabulary admin's "show
/// current grounding" view; re-measures on demand rather than only on the
/// scheduled cycle.
pub async fn handle_epistemic_remeasure(
    grounding: &GroundingEngine,
    vocab_type: &VocabName,
) -> Result<EpistemicStatus, GroundingError> {
    let (status, _stats) = grounding.measure_epistemic_status(vocab_type, None).await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_response_flags_reused_existing_with_a_force_hint() {
        let outcome = IngestionOutcome {
            document_id: crate::types::DocumentId::from_content_hash("abc123"),
            epoch: 7,
            source_count: 1,
            concept_count: 0,
            instance_count: 0,
            reused_existing: true,
        };
        let response = IngestResponse::from(outcome);
        assert!(response.reused_existing);
        assert!(response.retry_with_force_hint.is_some());
    }

    #[test]
    fn ingest_response_omits_force_hint_on_fresh_ingestion() {
        let outcome = IngestionOutcome {
            document_id: crate::types::DocumentId::from_content_hash("def456"),
            epoch: 1,
            source_count: 2,
            concept_count: 5,
            instance_count: 8,
            reused_existing: false,
        };
        let response = IngestResponse::from(outcome);
        assert!(response.retry_with_force_hint.is_none());
    }

    #[test]
    fn default_search_request_uses_the_match_threshold() {
        assert_eq!(default_min_similarity(), MATCH_THRESHOLD);
    }
}
