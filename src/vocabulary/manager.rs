// Vocabulary manager business logic (§4.3): categorization, sync, merge,
// sitting atop `store::vocabulary` for persistence and `EmbeddingService`
// for the similarity math's inputs.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::embeddings::{EmbeddingError, EmbeddingService};
use crate::pure::categorization::{assign_category, compute_category_scores, CategoryAssignment};
use crate::store::{GraphStore, StoreError};
use crate::types::{CategorySource, DirectionSemantics, VocabCategory, VocabName};

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("{name} has no embedding and cannot be categorized")]
    NoEmbedding { name: String },
    #[error("vocab type {name} is not registered")]
    NotFound { name: String },
    #[error("validation error: {0}")]
    Validation(#[from] crate::types::ValidationError),
}

pub struct VocabularyManager {
    store: Arc<GraphStore>,
    embeddings: Arc<EmbeddingService>,
}

impl VocabularyManager {
    pub fn new(store: Arc<GraphStore>, embeddings: Arc<EmbeddingService>) -> Self {
        Self { store, embeddings }
    }

    /// §4.3: category assigned by similarity to the 30 built-in seed types.
    /// Fails with `NoEmbedding` if the candidate has not been embedded yet —
    /// mirrors §8's boundary behavior "`VocabType` with no embedding cannot
    /// be categorized".
    #[instrument(skip(self))]
    pub async fn categorize(&self, name: &VocabName) -> Result<CategoryAssignment, VocabularyError> {
        let vocab_type = self
            .store
            .get_vocab_type(name)
            .await?
            .ok_or_else(|| VocabularyError::NotFound { name: name.to_string() })?;

        let candidate: Vec<f32> = vocab_type
            .embedding
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| VocabularyError::NoEmbedding { name: name.to_string() })?;

        let seed_embeddings = self.seed_embeddings().await?;
        let scores = compute_category_scores(&candidate, &seed_embeddings);
        let assignment = assign_category(&scores).ok_or_else(|| VocabularyError::NoEmbedding {
            name: name.to_string(),
        })?;

        let scores_json = serde_json::to_value(
            scores
                .0
                .iter()
                .map(|(c, s)| (format!("{c:?}").to_lowercase(), *s))
                .collect::<HashMap<_, _>>(),
        )
        .unwrap_or(serde_json::Value::Null);

        self.store
            .set_category_assignment(name, assignment.category, assignment.confidence, &scores_json, assignment.ambiguous)
            .await?;

        Ok(assignment)
    }

    async fn seed_embeddings(&self) -> Result<HashMap<&'static str, Vec<f32>>, VocabularyError> {
        let seeds = crate::embeddings::builtin_seed_names();
        let names: Vec<VocabName> = seeds
            .iter()
            .map(|s| VocabName::new(*s))
            .collect::<Result<_, _>>()?;
        let fetched = self.store.fetch_vocab_embeddings(&names).await?;

        let mut out = HashMap::new();
        for seed in seeds {
            if let Some(embedding) = fetched.get(seed) {
                out.insert(seed, embedding.clone());
            }
        }
        Ok(out)
    }

    /// Re-categorize registered VocabTypes. With `only_computed = true`
    /// (the default per §4.3's refresh-scope paragraph), types whose
    /// category was `assigned_at_creation` (the built-in seeds) are left
    /// alone; only LLM/sync-discovered types are re-scored against the
    /// current seed embeddings.
    #[instrument(skip(self))]
    pub async fn refresh_all_categories(&self, only_computed: bool) -> Result<Vec<String>, VocabularyError> {
        let all = self.store.list_vocab_types().await?;
        let mut refreshed = Vec::new();

        for vocab_type in all {
            if only_computed && vocab_type.category_source() != CategorySource::Computed {
                continue;
            }
            if vocab_type.embedding.is_none() {
                continue;
            }
            let Ok(name) = VocabName::new(&vocab_type.relationship_type) else {
                continue;
            };
            match self.categorize(&name).await {
                Ok(_) => refreshed.push(vocab_type.relationship_type),
                Err(e) => warn!(vocab_type = %name, error = %e, "category refresh failed, leaving existing assignment"),
            }
        }
        Ok(refreshed)
    }

    /// Cold-start: ensure every built-in seed type exists with
    /// `category = assigned_at_creation`, embedding it if missing.
    #[instrument(skip(self))]
    pub async fn seed_builtin_types(&self) -> Result<(), VocabularyError> {
        for (category, seeds) in crate::pure::categorization::CATEGORY_SEEDS.iter() {
            for seed in seeds.iter() {
                let name = VocabName::new(*seed)?;
                let vocab_type = self
                    .store
                    .get_or_create_vocab_type(
                        &name,
                        None,
                        *category,
                        CategorySource::AssignedAtCreation,
                        true,
                        DirectionSemantics::Outward,
                    )
                    .await?;
                if vocab_type.embedding.is_none() {
                    let embedded = self.embeddings.embed(seed).await?;
                    self.store.set_vocab_embedding(&name, &embedded.vector, &embedded.model_name).await?;
                }
            }
        }
        Ok(())
    }

    /// §4.3 sync: registers edge labels used in the graph but absent from
    /// `relationship_vocabulary`, categorizing each via embedding similarity
    /// when possible.
    #[instrument(skip(self))]
    pub async fn sync_missing(&self) -> Result<Vec<String>, VocabularyError> {
        let missing = self.store.find_unregistered_labels().await?;
        let mut synced = Vec::new();

        for label in missing {
            let Ok(name) = VocabName::new(&label) else {
                warn!(label = %label, "skipping unregisterable edge label during vocabulary sync");
                continue;
            };

            let embedded = self.embeddings.embed(name.as_str()).await;

            // Placeholder category until `categorize()` below computes the
            // real one from embedding similarity; only reached if embedding
            // succeeds, otherwise the type stays uncategorized for review.
            self.store
                .get_or_create_vocab_type(
                    &name,
                    None,
                    VocabCategory::Semantic,
                    CategorySource::Computed,
                    false,
                    DirectionSemantics::Outward,
                )
                .await?;

            if let Ok(embedded) = embedded {
                self.store.set_vocab_embedding(&name, &embedded.vector, &embedded.model_name).await?;
                if let Ok(assignment) = self.categorize(&name).await {
                    info!(label = %label, category = ?assignment.category, "vocabulary sync categorized new type");
                }
            }

            synced.push(label);
        }
        if !synced.is_empty() {
            self.store.bump_vocabulary_change_counter().await?;
        }
        Ok(synced)
    }

    /// §4.3 merge: delegate the transactional graph/relational mutation to
    /// the store; this layer only enforces that both names are known.
    #[instrument(skip(self))]
    pub async fn merge(&self, deprecated: &VocabName, target: &VocabName, reason: &str) -> Result<u64, VocabularyError> {
        if self.store.get_vocab_type(deprecated).await?.is_none() {
            return Err(VocabularyError::NotFound { name: deprecated.to_string() });
        }
        if self.store.get_vocab_type(target).await?.is_none() {
            return Err(VocabularyError::NotFound { name: target.to_string() });
        }
        match self.store.merge_vocab_types(deprecated, target, reason, None).await {
            Ok(count) => {
                self.store.bump_vocabulary_change_counter().await?;
                Ok(count)
            }
            Err(e) => {
                self.store
                    .record_repair_needed(deprecated, &format!("merge into {target} failed: {e}"))
                    .await?;
                Err(e.into())
            }
        }
    }
}
