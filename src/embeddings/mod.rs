// Embedding subsystem (§4.2). Split from the teacher's single
// `embeddings.rs` into provider/local/remote/service modules so the
// single-worker queueing concern (`local`) stays separate from the
// HTTP-passthrough concern (`remote`) and the caching/hot-swap concern
// (`service`).

mod local;
mod provider;
mod remote;
mod service;

pub use local::LocalEmbeddingProvider;
pub use provider::{EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingResult};
pub use remote::RemoteEmbeddingProvider;
pub use service::{EmbeddingService, ProfileSwapOutcome};

use std::collections::HashSet;

use crate::pure::categorization::CATEGORY_SEEDS;

/// The 30 built-in seed relationship type names (§4.3), flattened for
/// cold-start embedding seeding: on first boot the categorizer needs an
/// embedding for every seed before it can score any candidate type.
pub fn builtin_seed_names() -> HashSet<&'static str> {
    CATEGORY_SEEDS
        .iter()
        .flat_map(|(_, seeds)| seeds.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_seed_names_has_30_unique_entries() {
        let names = builtin_seed_names();
        assert_eq!(names.len(), 30);
    }
}
