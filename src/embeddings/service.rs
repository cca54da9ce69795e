// Hot-swappable embedding service (§3a, §4.2). Wraps the active provider in
// a lock so an admin-triggered profile change takes effect for the next
// request without restarting the process, mirroring how
// `kotadb-kota-db/src/embeddings.rs`'s `EmbeddingService` wraps a boxed
// provider with an in-memory cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::provider::{EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingResult};

/// Outcome of swapping the active provider, reported back so the caller (the
/// vocabulary/grounding subsystems) can decide whether stored embeddings now
/// need to be marked stale (§3a: dimension-mismatch staleness marking).
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSwapOutcome {
    pub previous: EmbeddingConfig,
    pub current: EmbeddingConfig,
    pub dimension_changed: bool,
}

pub struct EmbeddingService {
    active: RwLock<Arc<dyn EmbeddingProvider>>,
    cache: RwLock<HashMap<String, EmbeddingResult>>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            active: RwLock::new(provider),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> EmbeddingConfig {
        self.active.read().config()
    }

    /// Replace the active provider. The text cache is cleared unconditionally
    /// since cached vectors belong to the retired provider's space even when
    /// the dimension happens to match.
    pub fn swap_profile(&self, provider: Arc<dyn EmbeddingProvider>) -> ProfileSwapOutcome {
        let previous = self.active.read().config();
        let current = provider.config();
        let dimension_changed = previous.dimension != current.dimension;

        *self.active.write() = provider;
        self.cache.write().clear();

        ProfileSwapOutcome {
            previous,
            current,
            dimension_changed,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
        if let Some(cached) = self.cache.read().get(text) {
            return Ok(cached.clone());
        }

        let provider = self.active.read().clone();
        let result = provider.embed_text(text).await?;
        self.cache.write().insert(text.to_string(), result.clone());
        Ok(result)
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>, EmbeddingError> {
        let provider = self.active.read().clone();
        let mut results = Vec::with_capacity(texts.len());
        let mut to_fetch = Vec::new();
        let mut fetch_positions = Vec::new();

        {
            let cache = self.cache.read();
            for (idx, text) in texts.iter().enumerate() {
                if let Some(cached) = cache.get(text) {
                    results.push((idx, cached.clone()));
                } else {
                    to_fetch.push(text.clone());
                    fetch_positions.push(idx);
                }
            }
        }

        if !to_fetch.is_empty() {
            let fetched = provider.embed_texts(&to_fetch).await?;
            let mut cache = self.cache.write();
            for (text, (idx, result)) in to_fetch.iter().zip(fetch_positions.into_iter().zip(fetched)) {
                cache.insert(text.clone(), result.clone());
                results.push((idx, result));
            }
        }

        results.sort_by_key(|(idx, _)| *idx);
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::embeddings::local::LocalEmbeddingProvider;

    fn provider(dimension: usize, model_name: &str) -> Arc<dyn EmbeddingProvider> {
        let config = EmbeddingConfig {
            model_name: model_name.to_string(),
            dimension,
            max_batch_size: 16,
        };
        let embed_fn = Arc::new(move |text: &str| {
            let mut v = vec![0.0f32; dimension];
            let h = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
            v[(h as usize) % dimension] = 1.0;
            v
        });
        Arc::new(LocalEmbeddingProvider::new(config, embed_fn, 8))
    }

    #[tokio::test]
    async fn caches_repeated_text() {
        let service = EmbeddingService::new(provider(4, "local-a"));
        let first = service.embed("hello").await.unwrap();
        let second = service.embed("hello").await.unwrap();
        assert_eq!(first.vector, second.vector);
    }

    #[tokio::test]
    async fn swap_to_different_dimension_is_flagged() {
        let service = EmbeddingService::new(provider(4, "local-a"));
        service.embed("hello").await.unwrap();

        let outcome = service.swap_profile(provider(8, "local-b"));
        assert!(outcome.dimension_changed);
        assert_eq!(outcome.current.dimension, 8);
    }

    #[tokio::test]
    async fn swap_to_same_dimension_is_not_flagged() {
        let service = EmbeddingService::new(provider(4, "local-a"));
        let outcome = service.swap_profile(provider(4, "local-b"));
        assert!(!outcome.dimension_changed);
    }

    #[tokio::test]
    async fn batch_embedding_preserves_order() {
        let service = EmbeddingService::new(provider(4, "local-a"));
        let texts = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let results = service.embed_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].vector, results[2].vector);
    }
}
