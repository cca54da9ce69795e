// Layered configuration (§6a): compiled-in defaults -> `config.toml`/
// `config.yaml` file -> `ONTOLOGY_*` environment variables -> explicit
// overrides from the embedding caller. Grounded on the teacher's
// `contracts::DatabaseConfig`/`Configuration` trait shape; the `config`
// crate layering is the teacher's own optional `mcp-server`-feature
// dependency, promoted here since the worker binary needs it unconditionally.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { min_connections: 1, max_connections: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ontology".to_string(),
            pool: PoolConfig::default(),
        }
    }
}

/// Embedding provider selection (§3a, §6 "Embedding admin"). `endpoint`
/// present selects `RemoteEmbeddingProvider`; absent falls back to the
/// in-process `LocalEmbeddingProvider` worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProfileConfig {
    pub model_name: String,
    pub dimension: usize,
    pub max_batch_size: usize,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub queue_depth: usize,
}

impl Default for EmbeddingProfileConfig {
    fn default() -> Self {
        Self {
            model_name: "local-placeholder".to_string(),
            dimension: 384,
            max_batch_size: 64,
            endpoint: None,
            api_key: None,
            queue_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProviderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            model: "local-extraction-model".to_string(),
        }
    }
}

/// Launcher intervals and thresholds (§4.6). These are the code-default
/// fallback; `BreathingOptions` reads `kg_api.breathing_options` at each
/// launch and overrides what it can parse (`store::breathing::get_breathing_options`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    pub category_refresh_interval_secs: u64,
    pub epistemic_remeasurement_interval_secs: u64,
    pub epistemic_remeasurement_threshold: i64,
    pub breathing_interval_secs: u64,
    pub breathing_autonomous: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            category_refresh_interval_secs: 3600,
            epistemic_remeasurement_interval_secs: 3600,
            epistemic_remeasurement_threshold: 10,
            breathing_interval_secs: 300,
            breathing_autonomous: false,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
    pub fn category_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.category_refresh_interval_secs)
    }
    pub fn epistemic_remeasurement_interval(&self) -> Duration {
        Duration::from_secs(self.epistemic_remeasurement_interval_secs)
    }
    pub fn breathing_interval(&self) -> Duration {
        Duration::from_secs(self.breathing_interval_secs)
    }
}

/// Job-queue tuning (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQueueConfig {
    pub heartbeat_period_secs: u64,
    pub stale_after_secs: i64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self { heartbeat_period_secs: 15, stale_after_secs: 120 }
    }
}

impl JobQueueConfig {
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_period_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embedding: EmbeddingProfileConfig,
    #[serde(default)]
    pub ai_provider: AiProviderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub jobs: JobQueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            embedding: EmbeddingProfileConfig::default(),
            ai_provider: AiProviderConfig::default(),
            scheduler: SchedulerConfig::default(),
            jobs: JobQueueConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl OntologyConfig {
    /// Layers: compiled-in defaults (serialized into the builder so every
    /// field has a value even when no file or env var sets it) -> an
    /// optional `config.{toml,yaml}` at `path` -> `ONTOLOGY_*` environment
    /// variables, double-underscore-separated for nested keys
    /// (`ONTOLOGY_DATABASE__URL`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = OntologyConfig::default();
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ONTOLOGY")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder.build()?;
        Ok(built.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file_or_env_vars() {
        let config = OntologyConfig::load(None).expect("defaults alone must be sufficient");
        assert_eq!(config.database.pool.min_connections, 1);
        assert_eq!(config.database.pool.max_connections, 20);
        assert_eq!(config.scheduler.epistemic_remeasurement_threshold, 10);
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let config = OntologyConfig::load(Some("/nonexistent/path/to/config"));
        assert!(config.is_ok());
    }
}
