// Pure chunk-boundary arithmetic (§4.4). Splits word-tokenized text into
// overlapping windows honoring target/min/max word counts.

use crate::types::ChunkWordCounts;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBoundary {
    pub start_word: usize,
    pub end_word: usize,
}

/// Compute word-index boundaries for `total_words` words under the given
/// policy. Each chunk targets `target_words`, with `overlap_words` words of
/// context repeated at the start of the next chunk. The final chunk may be
/// shorter than `min_words` if it is the only remaining material.
pub fn compute_chunk_boundaries(total_words: usize, policy: ChunkWordCounts) -> Vec<ChunkBoundary> {
    if total_words == 0 {
        return Vec::new();
    }
    if total_words <= policy.max_words as usize {
        return vec![ChunkBoundary {
            start_word: 0,
            end_word: total_words,
        }];
    }

    let target = policy.target_words as usize;
    let overlap = policy.overlap_words as usize;
    let stride = target.saturating_sub(overlap).max(1);

    let mut boundaries = Vec::new();
    let mut start = 0usize;
    while start < total_words {
        let end = (start + target).min(total_words);
        boundaries.push(ChunkBoundary {
            start_word: start,
            end_word: end,
        });
        if end == total_words {
            break;
        }
        start += stride;
    }
    boundaries
}

/// Split text on whitespace into chunks of verbatim words per the computed
/// boundaries, returning the joined text for each chunk.
pub fn chunk_text(text: &str, policy: ChunkWordCounts) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    compute_chunk_boundaries(words.len(), policy)
        .into_iter()
        .map(|b| words[b.start_word..b.end_word].join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let policy = ChunkWordCounts::new(1000, 200).unwrap();
        let boundaries = compute_chunk_boundaries(50, policy);
        assert_eq!(boundaries, vec![ChunkBoundary { start_word: 0, end_word: 50 }]);
    }

    #[test]
    fn long_text_splits_with_overlap() {
        let policy = ChunkWordCounts::new(100, 20).unwrap();
        let boundaries = compute_chunk_boundaries(250, policy);
        assert!(boundaries.len() >= 2);
        // stride = 100 - 20 = 80; second chunk starts before first chunk ends.
        assert!(boundaries[1].start_word < boundaries[0].end_word);
        assert_eq!(boundaries.last().unwrap().end_word, 250);
    }

    #[test]
    fn chunk_text_joins_words() {
        let policy = ChunkWordCounts::new(100, 0).unwrap();
        let text = "one two three";
        let chunks = chunk_text(text, policy);
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let policy = ChunkWordCounts::default();
        assert!(compute_chunk_boundaries(0, policy).is_empty());
    }
}
