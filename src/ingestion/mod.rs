// Ingestion pipeline (§4.4).

pub mod job_handler;
pub mod pipeline;

pub use job_handler::IngestionJobHandler;
pub use pipeline::{ChunkProcessingMode, IngestionError, IngestionOptions, IngestionOutcome, IngestionPipeline, MATCH_THRESHOLD};
