// EpistemicRemeasurementLauncher (§4.6): every 1h, re-measure grounding for
// every registered vocabulary type once enough vocabulary mutations have
// accumulated since the last cycle.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::{instrument, warn};

use crate::grounding::GroundingEngine;
use crate::jobs::{Job, JobHandler};
use crate::scheduler::launcher::JobLauncher;
use crate::store::GraphStore;
use crate::types::VocabName;

pub struct EpistemicRemeasurementLauncher {
    store: Arc<GraphStore>,
    threshold: i64,
}

impl EpistemicRemeasurementLauncher {
    /// `threshold` defaults to 10 per §4.6's tunable table.
    pub fn new(store: Arc<GraphStore>, threshold: i64) -> Self {
        Self { store, threshold }
    }
}

#[async_trait]
impl JobLauncher for EpistemicRemeasurementLauncher {
    fn name(&self) -> &'static str {
        "epistemic_remeasurement"
    }

    async fn check_conditions(&self) -> anyhow::Result<bool> {
        let delta = self.store.vocabulary_change_delta().await?;
        Ok(delta >= self.threshold)
    }

    async fn prepare_job_data(&self) -> anyhow::Result<JsonValue> {
        Ok(json!({}))
    }

    fn get_job_type(&self) -> &'static str {
        "epistemic_remeasurement"
    }
}

pub struct EpistemicRemeasurementJobHandler {
    store: Arc<GraphStore>,
    grounding: Arc<GroundingEngine>,
}

impl EpistemicRemeasurementJobHandler {
    pub fn new(store: Arc<GraphStore>, grounding: Arc<GroundingEngine>) -> Self {
        Self { store, grounding }
    }
}

#[async_trait]
impl JobHandler for EpistemicRemeasurementJobHandler {
    #[instrument(skip(self, job, _cancel))]
    async fn handle(&self, job: &Job, _cancel: &AtomicBool) -> anyhow::Result<Option<JsonValue>> {
        let all = self.store.list_vocab_types().await?;
        let mut measured = 0u32;
        for vocab_type in all {
            let Ok(name) = VocabName::new(&vocab_type.relationship_type) else { continue };
            match self.grounding.measure_epistemic_status(&name, None).await {
                Ok(_) => measured += 1,
                Err(e) => warn!(job_id = %job.job_id, vocab_type = %name, error = %e, "epistemic remeasurement failed for this type"),
            }
        }
        self.store.mark_vocabulary_measurement_complete().await?;
        Ok(Some(json!({ "measured": measured })))
    }
}
