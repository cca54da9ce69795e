//! Property tests for chunk-boundary arithmetic, in the style of the
//! teacher's `tests/property_tests.rs`: generate arbitrary inputs with
//! `proptest` and assert invariants rather than fixed input/output pairs.

use ontology_core::pure::chunking::compute_chunk_boundaries;
use ontology_core::types::ChunkWordCounts;
use proptest::prelude::*;

fn arb_policy() -> impl Strategy<Value = ChunkWordCounts> {
    (100u32..=2000, 0u32..=500).prop_filter_map("valid policy", |(target, overlap)| {
        if overlap >= target {
            None
        } else {
            ChunkWordCounts::new(target, overlap).ok()
        }
    })
}

proptest! {
    #[test]
    fn boundaries_cover_every_word_exactly_to_the_end(total_words in 0usize..10_000, policy in arb_policy()) {
        let boundaries = compute_chunk_boundaries(total_words, policy);

        if total_words == 0 {
            prop_assert!(boundaries.is_empty());
            return Ok(());
        }

        prop_assert!(!boundaries.is_empty());
        prop_assert_eq!(boundaries.first().unwrap().start_word, 0);
        prop_assert_eq!(boundaries.last().unwrap().end_word, total_words);

        for boundary in &boundaries {
            prop_assert!(boundary.start_word < boundary.end_word);
            prop_assert!(boundary.end_word <= total_words);
        }
    }

    #[test]
    fn consecutive_boundaries_never_skip_words(total_words in 1usize..10_000, policy in arb_policy()) {
        let boundaries = compute_chunk_boundaries(total_words, policy);
        for pair in boundaries.windows(2) {
            prop_assert!(pair[1].start_word <= pair[0].end_word, "gap between chunks would drop words");
        }
    }
}
