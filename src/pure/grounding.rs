// Polarity-axis projection math (§4.5). Pure vector arithmetic only — no
// database or embedding-provider calls live in this module.

use super::cosine_similarity;
use crate::types::EpistemicStatus;

/// The five fixed opposing-type pairs the polarity axis is built from (§4.5).
pub const POLARITY_PAIRS: [(&str, &str); 5] = [
    ("SUPPORTS", "CONTRADICTS"),
    ("VALIDATES", "REFUTES"),
    ("CONFIRMS", "DISPROVES"),
    ("REINFORCES", "OPPOSES"),
    ("ENABLES", "PREVENTS"),
];

/// An edge type's confidence-weighted contribution to a concept's grounding.
#[derive(Debug, Clone, Copy)]
pub struct WeightedEdge {
    pub projection: f32,
    pub confidence: f64,
}

/// Normalize a vector to unit length. Returns `None` if the vector has zero
/// magnitude (mirrors the source's "zero difference vectors" guard).
fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

fn subtract(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(x, y)| x - y).collect()
}

fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dim = vectors[0].len();
    let mut out = vec![0.0f32; dim];
    for v in vectors {
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += x;
        }
    }
    let n = vectors.len() as f32;
    out.iter_mut().for_each(|x| *x /= n);
    out
}

/// Build the polarity axis from whichever opposing pairs have embeddings for
/// both poles. Returns `None` if no pair is embeddable, or if the resulting
/// mean-difference vector has zero magnitude.
pub fn compute_polarity_axis(pair_embeddings: &[(Vec<f32>, Vec<f32>)]) -> Option<Vec<f32>> {
    if pair_embeddings.is_empty() {
        return None;
    }
    let diffs: Vec<Vec<f32>> = pair_embeddings
        .iter()
        .map(|(pos, neg)| subtract(pos, neg))
        .collect();
    normalize(&mean_vector(&diffs))
}

/// Project an edge type's embedding onto the axis.
pub fn project_onto_axis(type_embedding: &[f32], axis: &[f32]) -> f32 {
    type_embedding
        .iter()
        .zip(axis.iter())
        .map(|(x, y)| x * y)
        .sum()
}

/// Confidence-weighted mean projection across a concept's incoming edges.
/// `Some(0.0)` when there are no qualifying edges (axis known, no evidence);
/// the caller is responsible for returning `None` upstream when the axis
/// itself could not be computed (§9 Open Question resolution).
pub fn weighted_grounding(edges: &[WeightedEdge]) -> f64 {
    let mut numerator = 0.0f64;
    let mut denominator = 0.0f64;
    for edge in edges {
        numerator += edge.confidence * edge.projection as f64;
        denominator += edge.confidence;
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Convenience wrapper matching the cosine helper used elsewhere; kept here
/// so callers reason about grounding using one import.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b)
}

/// Name-heuristic markers that short-circuit classification to `HISTORICAL`
/// regardless of measured grounding (§4.5, verbatim from
/// `epistemic_status_service.py`).
pub const HISTORICAL_MARKERS: [&str; 9] = [
    "WAS", "WERE", "HAD", "HISTORICAL", "FORMER", "PREVIOUS", "PAST", "ANCIENT", "ORIGINALLY",
];

fn is_historical_name(vocab_name: &str) -> bool {
    let upper = vocab_name.to_uppercase();
    HISTORICAL_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// Classify a VocabType's epistemic status from its name and its measured
/// grounding distribution, in the exact precedence order specified (§4.5).
/// `mean` is `None` when fewer than 3 successful measurements were taken.
pub fn classify_epistemic_status(vocab_name: &str, mean: Option<f64>, sample_count: usize) -> EpistemicStatus {
    if is_historical_name(vocab_name) {
        return EpistemicStatus::Historical;
    }
    if sample_count < 3 {
        return EpistemicStatus::InsufficientData;
    }
    let mean = match mean {
        Some(m) => m,
        None => return EpistemicStatus::InsufficientData,
    };
    if mean > 0.8 {
        EpistemicStatus::WellGrounded
    } else if (0.15..=0.8).contains(&mean) {
        EpistemicStatus::MixedGrounding
    } else if mean > 0.0 {
        EpistemicStatus::WeakGrounding
    } else if mean < -0.5 {
        EpistemicStatus::Contradicted
    } else {
        EpistemicStatus::PoorlyGrounded
    }
}

/// Coarse five-bucket histogram over `[-1, 1]`, matching original_source's
/// `calculate_grounding_stats` distribution shape.
pub fn distribution_histogram(samples: &[f64]) -> [usize; 5] {
    let mut buckets = [0usize; 5];
    for &value in samples {
        let idx = (((value + 1.0) / 0.4).floor() as isize).clamp(0, 4) as usize;
        buckets[idx] += 1;
    }
    buckets
}

/// Mean and population standard deviation of a sample set, `None` when empty.
pub fn mean_and_std(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_is_none_when_no_pairs() {
        assert!(compute_polarity_axis(&[]).is_none());
    }

    #[test]
    fn axis_is_unit_length() {
        let pos = vec![1.0, 0.0];
        let neg = vec![0.0, 1.0];
        let axis = compute_polarity_axis(&[(pos, neg)]).unwrap();
        let norm: f32 = axis.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn grounding_zero_with_no_edges() {
        assert_eq!(weighted_grounding(&[]), 0.0);
    }

    #[test]
    fn grounding_weighted_average() {
        let edges = vec![
            WeightedEdge {
                projection: 1.0,
                confidence: 1.0,
            },
            WeightedEdge {
                projection: -1.0,
                confidence: 1.0,
            },
        ];
        assert_eq!(weighted_grounding(&edges), 0.0);

        let edges = vec![
            WeightedEdge {
                projection: 1.0,
                confidence: 3.0,
            },
            WeightedEdge {
                projection: -1.0,
                confidence: 1.0,
            },
        ];
        assert_eq!(weighted_grounding(&edges), 0.5);
    }

    #[test]
    fn project_onto_axis_is_dot_product() {
        let axis = vec![1.0, 0.0];
        let emb = vec![0.5, 0.9];
        assert!((project_onto_axis(&emb, &axis) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn historical_name_short_circuits_regardless_of_mean() {
        assert_eq!(
            classify_epistemic_status("WAS_CAPITAL_OF", Some(0.95), 50),
            EpistemicStatus::Historical
        );
        assert_eq!(
            classify_epistemic_status("FORMER_MEMBER_OF", Some(-0.9), 50),
            EpistemicStatus::Historical
        );
    }

    #[test]
    fn insufficient_data_below_three_samples() {
        assert_eq!(
            classify_epistemic_status("SUPPORTS", Some(0.9), 2),
            EpistemicStatus::InsufficientData
        );
    }

    #[test]
    fn classify_precedence_order() {
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(0.81), 10), EpistemicStatus::WellGrounded);
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(0.5), 10), EpistemicStatus::MixedGrounding);
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(0.15), 10), EpistemicStatus::MixedGrounding);
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(0.1), 10), EpistemicStatus::WeakGrounding);
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(-0.6), 10), EpistemicStatus::Contradicted);
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(-0.2), 10), EpistemicStatus::PoorlyGrounded);
        assert_eq!(classify_epistemic_status("SUPPORTS", Some(0.0), 10), EpistemicStatus::PoorlyGrounded);
    }

    #[test]
    fn mean_and_std_of_constant_series_is_zero_variance() {
        let (mean, std) = mean_and_std(&[0.5, 0.5, 0.5]).unwrap();
        assert_eq!(mean, 0.5);
        assert_eq!(std, 0.0);
        assert!(mean_and_std(&[]).is_none());
    }

    #[test]
    fn histogram_buckets_cover_full_range() {
        let buckets = distribution_histogram(&[-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(buckets.iter().sum::<usize>(), 5);
    }
}
