// Embedding provider contract (§4.2). Grounded on
// `kotadb-kota-db/src/embeddings.rs`'s `EmbeddingProvider` trait, narrowed to
// what the ingestion/grounding/categorization subsystems actually call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    #[error("embedding request failed: {0}")]
    RequestFailed(String),
    #[error("embedding worker queue is full")]
    QueueFull,
    #[error("embedding worker shut down")]
    WorkerGone,
}

/// Static facts about a configured provider, used for cold-start logging and
/// for detecting a dimension change across a profile swap (§3a).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimension: usize,
    pub max_batch_size: usize,
}

/// One embedded text alongside the provider identity that produced it, so
/// callers can detect a profile change mid-flight without a second lookup.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub model_name: String,
    pub dimension: usize,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>, EmbeddingError>;

    async fn embed_text(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
        let mut results = self.embed_texts(std::slice::from_ref(&text.to_string())).await?;
        results
            .pop()
            .ok_or_else(|| EmbeddingError::RequestFailed("provider returned no vectors".into()))
    }

    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    fn max_batch_size(&self) -> usize;

    fn config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            model_name: self.model_name().to_string(),
            dimension: self.dimension(),
            max_batch_size: self.max_batch_size(),
        }
    }
}
