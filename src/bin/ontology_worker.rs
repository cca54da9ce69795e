//! Ontology worker process.
//!
//! Wires `GraphStore`, `EmbeddingService`, an `AiProvider`, and the
//! `JobQueue`/`Scheduler` pair, registers a handler for every job type this
//! crate enqueues (`ingestion`, `breathing`, `category_refresh`,
//! `epistemic_remeasurement`), then runs the scheduler loop until the
//! process receives a shutdown signal.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ontology_core::ai_provider::{AiProvider, LocalModelProvider, RemoteChatProvider};
use ontology_core::config::OntologyConfig;
use ontology_core::embeddings::{EmbeddingConfig, EmbeddingService, LocalEmbeddingProvider, RemoteEmbeddingProvider};
use ontology_core::grounding::GroundingEngine;
use ontology_core::ingestion::{IngestionJobHandler, IngestionPipeline};
use ontology_core::jobs::JobQueue;
use ontology_core::observability::init_logging_with_level;
use ontology_core::scheduler::{
    BreathingJobHandler, BreathingLauncher, CategoryRefreshJobHandler, CategoryRefreshLauncher,
    EpistemicRemeasurementJobHandler, EpistemicRemeasurementLauncher, Scheduler,
};
use ontology_core::store::GraphStore;
use ontology_core::vocabulary::VocabularyManager;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ontology knowledge-graph worker")]
struct Args {
    /// Path to a config.toml/config.yaml (extension omitted), overriding
    /// compiled-in defaults; `ONTOLOGY_*` env vars apply on top of either.
    #[arg(short = 'c', long)]
    config: Option<String>,

    #[arg(short = 'v', long)]
    verbose: bool,

    #[arg(short = 'q', long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = OntologyConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    init_logging_with_level(args.verbose || config.logging.verbose, args.quiet || config.logging.quiet)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting ontology worker");

    let store = Arc::new(
        GraphStore::connect_with_pool_bounds(
            &config.database.url,
            config.database.pool.min_connections,
            config.database.pool.max_connections,
        )
        .await
        .context("failed to connect to the graph store")?,
    );

    let embeddings = Arc::new(build_embedding_service(&config));
    let ai_provider = build_ai_provider(&config);
    let vocabulary = Arc::new(VocabularyManager::new(store.clone(), embeddings.clone()));
    let grounding = Arc::new(GroundingEngine::new(store.clone()));

    vocabulary.seed_builtin_types().await.context("failed to seed builtin vocabulary types")?;

    let queue = Arc::new(JobQueue::new(store.clone(), config.jobs.heartbeat_period(), config.jobs.stale_after_secs));

    let mut scheduler = Scheduler::new(queue.clone(), config.scheduler.poll_interval());

    scheduler.register_launcher(Arc::new(BreathingLauncher::new(store.clone())), config.scheduler.breathing_interval());
    scheduler.register_launcher(Arc::new(CategoryRefreshLauncher::new(store.clone())), config.scheduler.category_refresh_interval());
    scheduler.register_launcher(
        Arc::new(EpistemicRemeasurementLauncher::new(store.clone(), config.scheduler.epistemic_remeasurement_threshold)),
        config.scheduler.epistemic_remeasurement_interval(),
    );

    scheduler.register_handler(
        "breathing",
        Arc::new(BreathingJobHandler::new(store.clone(), grounding.clone(), config.scheduler.breathing_autonomous)),
    );
    scheduler.register_handler("category_refresh", Arc::new(CategoryRefreshJobHandler::new(vocabulary.clone())));
    scheduler.register_handler("epistemic_remeasurement", Arc::new(EpistemicRemeasurementJobHandler::new(store.clone(), grounding.clone())));

    let ingestion_pipeline = Arc::new(IngestionPipeline::new(store.clone(), embeddings.clone(), ai_provider));
    scheduler.register_handler("ingestion", Arc::new(IngestionJobHandler::new(ingestion_pipeline)));

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping worker");
        }
    }

    Ok(())
}

fn build_embedding_service(config: &OntologyConfig) -> EmbeddingService {
    let embed_config = EmbeddingConfig {
        model_name: config.embedding.model_name.clone(),
        dimension: config.embedding.dimension,
        max_batch_size: config.embedding.max_batch_size,
    };

    match &config.embedding.endpoint {
        Some(endpoint) => EmbeddingService::new(Arc::new(RemoteEmbeddingProvider::new(
            embed_config,
            endpoint.clone(),
            config.embedding.api_key.clone(),
        ))),
        None => {
            let embed_fn = Arc::new(|_: &str| vec![0.0_f32; config.embedding.dimension]);
            EmbeddingService::new(Arc::new(LocalEmbeddingProvider::new(embed_config, embed_fn, config.embedding.queue_depth)))
        }
    }
}

/// Selects a remote chat-completion provider when an API key is configured,
/// otherwise talks to a locally hosted model at the same endpoint.
fn build_ai_provider(config: &OntologyConfig) -> Arc<dyn AiProvider> {
    match &config.ai_provider.api_key {
        Some(api_key) => Arc::new(RemoteChatProvider::new(
            config.ai_provider.endpoint.clone(),
            api_key.clone(),
            config.ai_provider.model.clone(),
        )),
        None => Arc::new(LocalModelProvider::new(config.ai_provider.endpoint.clone(), config.ai_provider.model.clone())),
    }
}
