// BreathingLauncher and the annealing cycle it dispatches (§4.6). The
// condition check *is* the claim: both happen inside one atomic UPDATE, so
// this launcher overrides `launch()` instead of composing the default
// check/prepare/enqueue sequence the trait provides.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::AtomicBool;
use tracing::{info, instrument};

use crate::grounding::GroundingEngine;
use crate::jobs::{Job, JobHandler, JobQueue};
use crate::scheduler::launcher::JobLauncher;
use crate::store::GraphStore;
use crate::types::{JobId, ProposalKind};

pub struct BreathingLauncher {
    store: Arc<GraphStore>,
}

impl BreathingLauncher {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobLauncher for BreathingLauncher {
    fn name(&self) -> &'static str {
        "breathing"
    }

    /// Used only for external health/telemetry reporting; the real
    /// check-and-claim happens inside `launch()`.
    async fn check_conditions(&self) -> anyhow::Result<bool> {
        let options = self.store.get_breathing_options().await;
        if !options.enabled {
            return Ok(false);
        }
        let epoch = self.store.current_epoch().await?;
        Ok(epoch > 0)
    }

    async fn prepare_job_data(&self) -> anyhow::Result<JsonValue> {
        Ok(json!({}))
    }

    fn get_job_type(&self) -> &'static str {
        "breathing"
    }

    #[instrument(skip(self, queue))]
    async fn launch(&self, queue: &JobQueue) -> anyhow::Result<Option<JobId>> {
        let options = self.store.get_breathing_options().await;
        if !options.enabled {
            return Ok(None);
        }

        let Some(epoch) = self.store.claim_breathing_epoch(options.epoch_interval).await? else {
            return Ok(None);
        };

        let payload = json!({
            "epoch": epoch,
            "demotion_threshold": options.demotion_threshold,
            "promotion_min_degree": options.promotion_min_degree,
            "max_proposals": options.max_proposals,
        });
        let job_id = queue.enqueue("breathing", payload, true, true, super::launcher::LAUNCHER_MAX_RETRIES).await?;
        Ok(Some(job_id))
    }
}

/// Executes one breathing cycle (§4.6: "score -> identify promotion/demotion
/// candidates -> optional LLM judgment -> record proposals"). LLM judgment is
/// out of scope for this cycle (Non-goal: no autonomous LLM-driven ontology
/// rewrites without review) — proposals are scored purely from grounding and
/// degree.
pub struct BreathingJobHandler {
    store: Arc<GraphStore>,
    grounding: Arc<GroundingEngine>,
    autonomous: bool,
}

impl BreathingJobHandler {
    pub fn new(store: Arc<GraphStore>, grounding: Arc<GroundingEngine>, autonomous: bool) -> Self {
        Self { store, grounding, autonomous }
    }
}

#[async_trait]
impl JobHandler for BreathingJobHandler {
    #[instrument(skip(self, job, cancel))]
    async fn handle(&self, job: &Job, cancel: &AtomicBool) -> anyhow::Result<Option<JsonValue>> {
        let max_proposals = job.payload.get("max_proposals").and_then(|v| v.as_i64()).unwrap_or(5);
        let demotion_threshold = job.payload.get("demotion_threshold").and_then(|v| v.as_f64()).unwrap_or(0.15);
        let promotion_min_degree = job.payload.get("promotion_min_degree").and_then(|v| v.as_i64()).unwrap_or(10);

        let candidates = self.store.sample_concepts_for_annealing(max_proposals * 4).await?;
        let mut proposals_written = 0u32;

        for (concept_id, degree) in candidates {
            if cancel.load(std::sync::atomic::Ordering::Relaxed) || proposals_written as i64 >= max_proposals {
                break;
            }

            let grounding = self.grounding.grounding(concept_id).await?;
            let kind = match grounding {
                Some(g) if g < demotion_threshold => Some(ProposalKind::Demote),
                Some(_) if degree >= promotion_min_degree => Some(ProposalKind::Promote),
                _ => None,
            };

            let Some(kind) = kind else { continue };
            let rationale = format!("grounding={grounding:?} degree={degree}");
            let proposal_id = self.store.record_annealing_proposal(concept_id, kind, &rationale, self.autonomous).await?;
            proposals_written += 1;

            if self.autonomous {
                // Autonomous mode dispatches the proposal as an execution
                // within the same cycle rather than waiting for review.
                self.store.mark_proposal_executed(proposal_id).await?;
            }
        }

        info!(job_id = %job.job_id, proposals_written, autonomous = self.autonomous, "breathing cycle complete");
        Ok(Some(json!({ "proposals_written": proposals_written })))
    }
}
