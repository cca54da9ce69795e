// Porter-stem matcher for relationship-label normalization (§4.4 step 3:
// "normalize the LLM's relationship label (Porter-stem matcher against
// existing VocabTypes)"). Delegates to `rust_stemmers`'s Snowball English
// algorithm rather than a hand-rolled suffix table, so CAUSES/CAUSING/CAUSED
// land on the same stem.

use rust_stemmers::{Algorithm, Stemmer};

/// Reduce a label to a comparison stem via the Porter algorithm.
/// Case-insensitive: the label is lowercased before stemming.
pub fn stem(label: &str) -> String {
    let stemmer = Stemmer::create(Algorithm::English);
    stemmer.stem(&label.trim().to_lowercase()).into_owned()
}

/// Find an existing vocab name whose stem matches the candidate label's
/// stem. Returns the first match; callers should pass candidates in a
/// stable order (e.g. the order VocabTypes were registered) for determinism.
pub fn find_stem_match<'a>(candidate: &str, existing: &'a [String]) -> Option<&'a str> {
    let candidate_stem = stem(candidate);
    existing.iter().map(|s| s.as_str()).find(|name| stem(name) == candidate_stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_stems_equal() {
        assert_eq!(stem("CAUSES"), stem("CAUSES"));
    }

    #[test]
    fn plural_and_singular_share_a_stem() {
        assert_eq!(stem("ENABLES"), stem("ENABLE"));
    }

    #[test]
    fn gerund_and_base_share_a_stem() {
        assert_eq!(stem("SUPPORTING"), stem("SUPPORT"));
    }

    #[test]
    fn gerund_past_and_plural_all_share_a_stem() {
        assert_eq!(stem("CAUSES"), stem("CAUSED"));
        assert_eq!(stem("CAUSES"), stem("CAUSING"));
    }

    #[test]
    fn find_stem_match_locates_existing_variant() {
        let existing = vec!["SUPPORTS".to_string(), "CONTRADICTS".to_string()];
        assert_eq!(find_stem_match("SUPPORTING", &existing), Some("SUPPORTS"));
        assert_eq!(find_stem_match("REFUTES", &existing), None);
    }
}
