// Probabilistic vocabulary categorization math (§4.3). Category score is the
// MAX similarity to any seed in the category ("satisficing"), not the mean —
// this keeps a type that strongly matches one seed from being diluted by
// weak matches to the category's other seeds.

use std::collections::HashMap;

use super::cosine_similarity;
use crate::types::VocabCategory;

pub const CONFIDENCE_HIGH: f64 = 0.70;
pub const CONFIDENCE_MEDIUM: f64 = 0.50;
pub const AMBIGUITY_THRESHOLD: f64 = 0.70;

/// The 30 built-in seed relationship types grouped under the 11 fixed
/// categories (§4.3, verbatim from original_source's `vocabulary_categorizer.py`).
pub const CATEGORY_SEEDS: [(VocabCategory, &[&str]); 11] = [
    (
        VocabCategory::Causation,
        &["CAUSES", "ENABLES", "PREVENTS", "INFLUENCES", "RESULTS_FROM"],
    ),
    (
        VocabCategory::Composition,
        &[
            "PART_OF",
            "CONTAINS",
            "COMPOSED_OF",
            "SUBSET_OF",
            "INSTANCE_OF",
            "COMPLEMENTS",
        ],
    ),
    (
        VocabCategory::Logical,
        &["IMPLIES", "CONTRADICTS", "PRESUPPOSES", "EQUIVALENT_TO"],
    ),
    (
        VocabCategory::Evidential,
        &["SUPPORTS", "REFUTES", "EXEMPLIFIES", "MEASURED_BY"],
    ),
    (
        VocabCategory::Semantic,
        &["SIMILAR_TO", "ANALOGOUS_TO", "CONTRASTS_WITH", "OPPOSITE_OF"],
    ),
    (
        VocabCategory::Temporal,
        &["PRECEDES", "CONCURRENT_WITH", "EVOLVES_INTO"],
    ),
    (
        VocabCategory::Dependency,
        &["DEPENDS_ON", "REQUIRES", "CONSUMES", "PRODUCES"],
    ),
    (
        VocabCategory::Derivation,
        &["DERIVED_FROM", "GENERATED_BY", "BASED_ON"],
    ),
    (
        VocabCategory::Operation,
        &["ANALYZES", "CALCULATES", "PROCESSES", "TRANSFORMS", "EVALUATES"],
    ),
    (
        VocabCategory::Interaction,
        &[
            "INTEGRATES_WITH",
            "COMMUNICATES_WITH",
            "CONNECTS_TO",
            "INTERACTS_WITH",
        ],
    ),
    (
        VocabCategory::Modification,
        &["CONFIGURES", "UPDATES", "ENHANCES", "OPTIMIZES", "IMPROVES"],
    ),
];

/// Per-category similarity scores for one candidate relationship type.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScores(pub HashMap<VocabCategory, f64>);

/// Compute the category score vector for a candidate embedding against a map
/// of seed-name -> seed-embedding. Seeds missing from `seed_embeddings` are
/// skipped for their category (a category with no resolvable seeds gets no
/// entry at all).
pub fn compute_category_scores(
    candidate: &[f32],
    seed_embeddings: &HashMap<&str, Vec<f32>>,
) -> CategoryScores {
    let mut scores = HashMap::new();
    for (category, seeds) in CATEGORY_SEEDS.iter() {
        let best = seeds
            .iter()
            .filter_map(|seed| seed_embeddings.get(seed))
            .map(|seed_embedding| cosine_similarity(candidate, seed_embedding) as f64)
            .fold(None::<f64>, |acc, score| {
                Some(acc.map_or(score, |a: f64| a.max(score)))
            });
        if let Some(best) = best {
            scores.insert(*category, best);
        }
    }
    CategoryScores(scores)
}

/// Final assignment: argmax category, its score as confidence, and whether
/// the runner-up is close enough to call the assignment ambiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAssignment {
    pub category: VocabCategory,
    pub confidence: f64,
    pub ambiguous: bool,
    pub runner_up: Option<(VocabCategory, f64)>,
}

/// Confidence band for a category assignment (§4.3 thresholds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    LowNeedsReview,
}

pub fn confidence_band(confidence: f64) -> ConfidenceBand {
    if confidence >= CONFIDENCE_HIGH {
        ConfidenceBand::High
    } else if confidence >= CONFIDENCE_MEDIUM {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::LowNeedsReview
    }
}

/// Assign a category from a computed score map. Returns `None` if the score
/// map is empty (no seed embeddings were resolvable at all).
pub fn assign_category(scores: &CategoryScores) -> Option<CategoryAssignment> {
    let mut ranked: Vec<(VocabCategory, f64)> = scores.0.iter().map(|(c, s)| (*c, *s)).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("scores are never NaN"));

    let (top_category, top_score) = *ranked.first()?;
    let runner_up = ranked.get(1).copied();
    let ambiguous = runner_up.map(|(_, s)| s > AMBIGUITY_THRESHOLD).unwrap_or(false);

    Some(CategoryAssignment {
        category: top_category,
        confidence: top_score,
        ambiguous,
        runner_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed(tag: &str) -> Vec<f32> {
        // Deterministic pseudo-embedding for tests: distinct orthogonal-ish
        // basis vectors keyed by a stable hash of the tag.
        let mut v = vec![0.0f32; 4];
        let h = tag.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
        v[(h % 4) as usize] = 1.0;
        v[((h / 4) % 4) as usize] += 0.3;
        v
    }

    #[test]
    fn category_seed_table_has_30_entries() {
        let total: usize = CATEGORY_SEEDS.iter().map(|(_, seeds)| seeds.len()).sum();
        assert_eq!(total, 30);
        assert_eq!(CATEGORY_SEEDS.len(), 11);
    }

    #[test]
    fn missing_embedding_raises_empty_scores() {
        let scores = compute_category_scores(&embed("X"), &HashMap::new());
        assert!(scores.0.is_empty());
        assert!(assign_category(&scores).is_none());
    }

    #[test]
    fn exact_match_to_a_seed_scores_near_one() {
        let mut seeds = HashMap::new();
        seeds.insert("SUPPORTS", embed("SUPPORTS"));
        seeds.insert("REFUTES", embed("REFUTES"));
        let scores = compute_category_scores(&embed("SUPPORTS"), &seeds);
        let assignment = assign_category(&scores).unwrap();
        assert_eq!(assignment.category, VocabCategory::Evidential);
        assert!(assignment.confidence > 0.99);
    }

    #[test]
    fn ambiguity_flagged_when_runner_up_is_close() {
        let scores = CategoryScores(
            [
                (VocabCategory::Causation, 0.91),
                (VocabCategory::Dependency, 0.90),
            ]
            .into_iter()
            .collect(),
        );
        let assignment = assign_category(&scores).unwrap();
        assert!(assignment.ambiguous);
    }

    #[test]
    fn confidence_bands() {
        assert_eq!(confidence_band(0.9), ConfidenceBand::High);
        assert_eq!(confidence_band(0.6), ConfidenceBand::Medium);
        assert_eq!(confidence_band(0.2), ConfidenceBand::LowNeedsReview);
    }

    #[test]
    fn idempotent_categorization() {
        let mut seeds = HashMap::new();
        seeds.insert("CAUSES", embed("CAUSES"));
        seeds.insert("SIMILAR_TO", embed("SIMILAR_TO"));
        let candidate = embed("OPTIMIZES_FOR");
        let first = compute_category_scores(&candidate, &seeds);
        let second = compute_category_scores(&candidate, &seeds);
        assert_eq!(first, second);
    }
}
