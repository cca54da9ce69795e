// Grounding engine (§4.5): polarity-axis projection, per-concept and batch
// grounding, and epistemic-status measurement. Orchestration only — the
// vector arithmetic and classification precedence live in `pure::grounding`
// so they stay unit-testable without a database.

mod engine;

pub use engine::{GroundingEngine, GroundingError, GroundingStats};
