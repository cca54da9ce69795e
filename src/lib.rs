// Ontology knowledge-graph core - root library module

pub mod ai_provider;
pub mod builders;
pub mod config;
pub mod contracts;
pub mod embeddings;
pub mod grounding;
pub mod ingestion;
pub mod jobs;
pub mod observability;
pub mod pure;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod validation;
pub mod vocabulary;

// Re-export observability helpers
pub use observability::{init_logging, init_logging_with_level};

// Re-export core identifier / value types
pub use types::{
    CategorySource, ChunkWordCounts, Confidence, ConceptId, ContentType, DirectionSemantics,
    DocumentId, Epoch, EpistemicStatus, InstanceId, JobId, OntologyId, OntologyLifecycle,
    ProposalId, ProposalKind, ProposalStatus, SourceId, ValidationError, VocabCategory, VocabName,
};

// Re-export builders
pub use builders::{ConceptBuilder, OntologyBuilder, SourceBuilder, VocabTypeBuilder};

// Re-export the store
pub use store::{GraphStore, StoreError};

// Re-export embedding providers and service
pub use embeddings::{
    EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingResult, EmbeddingService,
    LocalEmbeddingProvider, RemoteEmbeddingProvider,
};

// Re-export vocabulary management
pub use vocabulary::{VocabularyError, VocabularyManager};

// Re-export ingestion pipeline
pub use ingestion::{IngestionError, IngestionJobHandler, IngestionOptions, IngestionOutcome, IngestionPipeline};

// Re-export grounding / epistemic measurement
pub use grounding::{GroundingEngine, GroundingError, GroundingStats};

// Re-export scheduler and launchers
pub use scheduler::{
    BreathingJobHandler, BreathingLauncher, CategoryRefreshJobHandler, CategoryRefreshLauncher,
    EpistemicRemeasurementJobHandler, EpistemicRemeasurementLauncher, Scheduler,
};

// Re-export job queue
pub use jobs::{Job, JobHandler, JobQueue, JobQueueError, JobStatus};

// Re-export AI provider trait and implementations
pub use ai_provider::{AiProvider, AiProviderError, LocalModelProvider, RemoteChatProvider};

// Re-export layered configuration
pub use config::{ConfigError, OntologyConfig};
