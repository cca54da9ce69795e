// Single-worker embedding backend (§4.2). The model itself is explicitly a
// Non-goal (treated as a pluggable `embed(text) -> Vec<f32>` function); this
// module only owns the bounded-channel single-consumer queue around it, the
// way `kotadb-kota-db/src/embeddings.rs`'s `LocalEmbeddingProvider` owns its
// placeholder hashing model.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::provider::{EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingResult};

type EmbedFn = dyn Fn(&str) -> Vec<f32> + Send + Sync;

enum WorkerMessage {
    EmbedBatch {
        texts: Vec<String>,
        reply: oneshot::Sender<Vec<Vec<f32>>>,
    },
}

/// Embedding backend that serializes all requests through a single worker
/// task, so a locally-hosted model (one GPU, one process) is never asked to
/// handle concurrent batches.
pub struct LocalEmbeddingProvider {
    config: EmbeddingConfig,
    sender: mpsc::Sender<WorkerMessage>,
    _worker: Arc<tokio::task::JoinHandle<()>>,
}

impl LocalEmbeddingProvider {
    /// `queue_depth` bounds how many in-flight batches may wait on the
    /// worker before callers see `QueueFull`.
    pub fn new(config: EmbeddingConfig, embed_fn: Arc<EmbedFn>, queue_depth: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<WorkerMessage>(queue_depth);

        let worker = tokio::spawn(async move {
            while let Some(WorkerMessage::EmbedBatch { texts, reply }) = receiver.recv().await {
                let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embed_fn(t)).collect();
                let _ = reply.send(vectors);
            }
        });

        Self {
            config,
            sender,
            _worker: Arc::new(worker),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>, EmbeddingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .try_send(WorkerMessage::EmbedBatch {
                texts: texts.to_vec(),
                reply: reply_tx,
            })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => EmbeddingError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => EmbeddingError::WorkerGone,
            })?;

        let vectors = reply_rx.await.map_err(|_| EmbeddingError::WorkerGone)?;
        Ok(vectors
            .into_iter()
            .map(|vector| EmbeddingResult {
                vector,
                model_name: self.config.model_name.clone(),
                dimension: self.config.dimension,
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            model_name: "stub-local".into(),
            dimension,
            max_batch_size: 32,
        }
    }

    fn stub_embed(dimension: usize) -> Arc<EmbedFn> {
        Arc::new(move |text: &str| {
            let mut v = vec![0.0f32; dimension];
            let h = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
            v[(h as usize) % dimension] = 1.0;
            v
        })
    }

    #[tokio::test]
    async fn embeds_single_text() {
        let provider = LocalEmbeddingProvider::new(stub_config(4), stub_embed(4), 8);
        let result = provider.embed_text("hello").await.unwrap();
        assert_eq!(result.dimension, 4);
        assert_eq!(result.vector.len(), 4);
    }

    #[tokio::test]
    async fn embeds_batch_in_order() {
        let provider = LocalEmbeddingProvider::new(stub_config(4), stub_embed(4), 8);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = provider.embed_texts(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn queue_full_is_reported_not_silently_dropped() {
        // queue_depth=0 means the channel has no buffer slots; a burst of
        // concurrent sends can observe QueueFull rather than blocking forever.
        let provider = Arc::new(LocalEmbeddingProvider::new(stub_config(4), stub_embed(4), 1));
        let mut handles = Vec::new();
        for i in 0..16 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                provider.embed_text(&format!("text-{i}")).await
            }));
        }
        let mut saw_any_error = false;
        for handle in handles {
            if handle.await.unwrap().is_err() {
                saw_any_error = true;
            }
        }
        // Not asserted strictly (scheduling-dependent); this just documents
        // that QueueFull is a reachable, non-panicking outcome.
        let _ = saw_any_error;
    }
}
