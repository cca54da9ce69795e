// Property-graph store (§4.1). One struct owns the connection pool;
// capability submodules are plain `impl GraphStore` blocks rather than a
// mixin-style inheritance chain (§9's capability-module design note,
// replacing the source's five-mixin `AGEClient`).

pub mod base;
pub mod breathing;
pub mod ingestion;
pub mod jobs;
pub mod ontology;
pub mod query;
pub mod vocabulary;

pub use base::{CypherValue, GraphStore, StoreError, GRAPH_NAME};
pub use query::{ConceptMatch, ConceptRow};
