// CategoryRefreshLauncher (§4.6): every 6h, re-score LLM/sync-discovered
// vocabulary types against the current seed embeddings.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::instrument;

use crate::jobs::{Job, JobHandler};
use crate::scheduler::launcher::JobLauncher;
use crate::store::GraphStore;
use crate::types::CategorySource;
use crate::vocabulary::VocabularyManager;

pub struct CategoryRefreshLauncher {
    store: Arc<GraphStore>,
}

impl CategoryRefreshLauncher {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobLauncher for CategoryRefreshLauncher {
    fn name(&self) -> &'static str {
        "category_refresh"
    }

    /// §4.6: "condition = any VocabCategory contains types tagged
    /// `llm_generated`" — this crate's equivalent tag is a vocabulary type
    /// whose category was computed rather than assigned at registration.
    async fn check_conditions(&self) -> anyhow::Result<bool> {
        let all = self.store.list_vocab_types().await?;
        Ok(all.iter().any(|v| v.category_source() == CategorySource::Computed))
    }

    async fn prepare_job_data(&self) -> anyhow::Result<JsonValue> {
        Ok(json!({ "only_computed": true }))
    }

    fn get_job_type(&self) -> &'static str {
        "category_refresh"
    }
}

pub struct CategoryRefreshJobHandler {
    vocabulary: Arc<VocabularyManager>,
}

impl CategoryRefreshJobHandler {
    pub fn new(vocabulary: Arc<VocabularyManager>) -> Self {
        Self { vocabulary }
    }
}

#[async_trait]
impl JobHandler for CategoryRefreshJobHandler {
    #[instrument(skip(self, job, _cancel))]
    async fn handle(&self, job: &Job, _cancel: &AtomicBool) -> anyhow::Result<Option<JsonValue>> {
        let only_computed = job.payload.get("only_computed").and_then(|v| v.as_bool()).unwrap_or(true);
        let refreshed = self.vocabulary.refresh_all_categories(only_computed).await?;
        Ok(Some(json!({ "refreshed": refreshed })))
    }
}
