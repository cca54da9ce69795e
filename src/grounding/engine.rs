// GroundingEngine orchestration: fetches embeddings/edges from the store and
// delegates all arithmetic to `pure::grounding`. Grounded on
// `store::query`'s "two queries plus local math" batch shape and the
// teacher's `#[instrument(skip(self, ...))]` convention throughout
// `supabase_repository/job_worker.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::pure::grounding::{
    classify_epistemic_status, compute_polarity_axis, distribution_histogram, mean_and_std, project_onto_axis,
    weighted_grounding, WeightedEdge, POLARITY_PAIRS,
};
use crate::store::{GraphStore, StoreError};
use crate::types::{ConceptId, EpistemicStatus, VocabName};

#[derive(Debug, Error)]
pub enum GroundingError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("validation error: {0}")]
    Validation(#[from] crate::types::ValidationError),
}

/// Full sample payload for one VocabType's epistemic measurement (§4.5:
/// "calculate_grounding_stats returns ... not just the classification but
/// the full sample").
#[derive(Debug, Clone)]
pub struct GroundingStats {
    pub total_edges: i64,
    pub sampled_edges: usize,
    pub measured_concepts: usize,
    pub avg_grounding: Option<f64>,
    pub std_grounding: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub distribution: [usize; 5],
    pub measured_at: DateTime<Utc>,
}

const DEFAULT_SAMPLE_SIZE: i64 = 100;

pub struct GroundingEngine {
    store: Arc<GraphStore>,
}

impl GroundingEngine {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    /// Builds the polarity axis from whichever opposing-type pairs have both
    /// poles embedded already. `None` when no pair is embeddable (§4.5 step 3).
    #[instrument(skip(self))]
    async fn polarity_axis(&self) -> Result<Option<Vec<f32>>, GroundingError> {
        let names: Vec<VocabName> = POLARITY_PAIRS
            .iter()
            .flat_map(|(pos, neg)| [*pos, *neg])
            .map(VocabName::new)
            .collect::<Result<_, _>>()?;
        let embeddings = self.store.fetch_vocab_embeddings(&names).await?;

        let pair_embeddings: Vec<(Vec<f32>, Vec<f32>)> = POLARITY_PAIRS
            .iter()
            .filter_map(|(pos, neg)| Some((embeddings.get(*pos)?.clone(), embeddings.get(*neg)?.clone())))
            .collect();

        Ok(compute_polarity_axis(&pair_embeddings))
    }

    /// §4.5 step 4-5: grounding of a single concept. `None` when the axis
    /// itself cannot be computed; `Some(0.0)` when the axis is known but the
    /// concept has no qualifying incoming edges.
    #[instrument(skip(self))]
    pub async fn grounding(&self, concept_id: ConceptId) -> Result<Option<f64>, GroundingError> {
        let Some(axis) = self.polarity_axis().await? else {
            return Ok(None);
        };

        let incoming = self.store.fetch_incoming_edges_for_grounding(concept_id).await?;
        if incoming.is_empty() {
            return Ok(Some(0.0));
        }

        let type_names: Vec<VocabName> = incoming
            .iter()
            .filter_map(|(label, _)| VocabName::new(label).ok())
            .collect();
        let type_embeddings = self.store.fetch_vocab_embeddings(&type_names).await?;

        let weighted: Vec<WeightedEdge> = incoming
            .iter()
            .filter_map(|(label, confidence)| {
                let embedding = type_embeddings.get(label)?;
                Some(WeightedEdge {
                    projection: project_onto_axis(embedding, &axis),
                    confidence: *confidence,
                })
            })
            .collect();

        Ok(Some(weighted_grounding(&weighted)))
    }

    /// §4.5 batch API: one edge fetch and one vocab-embedding fetch per
    /// concept list, axis computed once, all scoring done locally.
    #[instrument(skip(self, concept_ids))]
    pub async fn grounding_batch(
        &self,
        concept_ids: &[ConceptId],
    ) -> Result<HashMap<ConceptId, Option<f64>>, GroundingError> {
        let Some(axis) = self.polarity_axis().await? else {
            return Ok(concept_ids.iter().map(|id| (*id, None)).collect());
        };

        let mut out = HashMap::with_capacity(concept_ids.len());
        for &concept_id in concept_ids {
            let incoming = self.store.fetch_incoming_edges_for_grounding(concept_id).await?;
            if incoming.is_empty() {
                out.insert(concept_id, Some(0.0));
                continue;
            }

            let type_names: Vec<VocabName> = incoming
                .iter()
                .filter_map(|(label, _)| VocabName::new(label).ok())
                .collect();
            let type_embeddings = self.store.fetch_vocab_embeddings(&type_names).await?;

            let weighted: Vec<WeightedEdge> = incoming
                .iter()
                .filter_map(|(label, confidence)| {
                    let embedding = type_embeddings.get(label)?;
                    Some(WeightedEdge {
                        projection: project_onto_axis(embedding, &axis),
                        confidence: *confidence,
                    })
                })
                .collect();

            out.insert(concept_id, Some(weighted_grounding(&weighted)));
        }
        Ok(out)
    }

    /// §4.5 epistemic-status measurement: sample up to `sample_size` edges of
    /// `vocab_type`, ground their target concepts, classify, and persist.
    #[instrument(skip(self))]
    pub async fn measure_epistemic_status(
        &self,
        vocab_type: &VocabName,
        sample_size: Option<i64>,
    ) -> Result<(EpistemicStatus, GroundingStats), GroundingError> {
        let sample_size = sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE);
        let total_edges = self.store.count_edges_for_vocab_type(vocab_type).await?;
        let targets = self
            .store
            .sample_target_concepts_for_vocab_type(vocab_type, sample_size)
            .await?;

        let groundings = self.grounding_batch(&targets).await?;
        let samples: Vec<f64> = groundings.values().filter_map(|g| *g).collect();

        let (mean, std) = match mean_and_std(&samples) {
            Some((m, s)) => (Some(m), Some(s)),
            None => (None, None),
        };
        let status = classify_epistemic_status(vocab_type.as_str(), mean, samples.len());

        let stats = GroundingStats {
            total_edges,
            sampled_edges: targets.len(),
            measured_concepts: samples.len(),
            avg_grounding: mean,
            std_grounding: std,
            max: samples.iter().cloned().fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x)))),
            min: samples.iter().cloned().fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x)))),
            distribution: distribution_histogram(&samples),
            measured_at: Utc::now(),
        };

        let stats_json = json!({
            "total_edges": stats.total_edges,
            "sampled_edges": stats.sampled_edges,
            "measured_concepts": stats.measured_concepts,
            "avg_grounding": stats.avg_grounding,
            "std_grounding": stats.std_grounding,
            "max": stats.max,
            "min": stats.min,
            "distribution": stats.distribution,
            "measured_at": stats.measured_at.to_rfc3339(),
        });
        let rationale = format!(
            "classified {status:?} from {} measured concepts (mean={:?})",
            stats.measured_concepts, stats.avg_grounding
        );

        if let Err(e) = self.store.set_epistemic_status(vocab_type, status, &rationale, &stats_json).await {
            warn!(vocab_type = %vocab_type, error = %e, "failed to persist epistemic status");
            return Err(e.into());
        }

        Ok((status, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounding_stats_construction_is_consistent_with_samples() {
        let samples = vec![0.9, 0.85, 0.95];
        let (mean, std) = mean_and_std(&samples).unwrap();
        let status = classify_epistemic_status("SUPPORTS", Some(mean), samples.len());
        assert_eq!(status, EpistemicStatus::WellGrounded);
        assert!(std >= 0.0);
    }
}
