// Launcher contract (§4.6): `check_conditions`, `prepare_job_data`,
// `get_job_type`, `launch`. The three-outcome semantics are enforced by
// `run_launcher_once`, not by the trait itself, so a launcher only has to
// implement the condition check and the job shape.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use crate::jobs::{JobQueue, JobQueueError};
use crate::pure::backoff::calculate_backoff_duration;
use crate::types::JobId;

/// Jobs a launcher enqueues are always system-originated and self-approving
/// (§4.6: "Jobs enqueued by launchers are marked `is_system_job`,
/// auto-approved, and executed immediately").
pub const LAUNCHER_MAX_RETRIES: i32 = 3;

#[async_trait]
pub trait JobLauncher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check_conditions(&self) -> anyhow::Result<bool>;

    async fn prepare_job_data(&self) -> anyhow::Result<JsonValue>;

    fn get_job_type(&self) -> &'static str;

    /// Default composition of the three hooks above: check, then build and
    /// enqueue. `BreathingLauncher` overrides this because its condition
    /// check and its job data both fall out of the same atomic epoch claim.
    async fn launch(&self, queue: &JobQueue) -> anyhow::Result<Option<JobId>> {
        if !self.check_conditions().await? {
            return Ok(None);
        }
        let payload = self.prepare_job_data().await?;
        let job_id = queue
            .enqueue(self.get_job_type(), payload, true, true, LAUNCHER_MAX_RETRIES)
            .await?;
        Ok(Some(job_id))
    }
}

/// Per-launcher retry bookkeeping the scheduler tick loop carries between
/// ticks (§4.6 three-outcome semantics: success and skip both reset it,
/// only an exception increments it).
#[derive(Debug, Default)]
pub struct LauncherRetryState {
    attempt: u32,
}

impl LauncherRetryState {
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn backoff_then_increment(&mut self) -> Duration {
        let backoff = calculate_backoff_duration(self.attempt, Duration::from_secs(1), Duration::from_secs(600));
        self.attempt = self.attempt.saturating_add(1);
        backoff
    }
}

/// Runs one launcher invocation against the strict three-outcome contract:
/// `job_id` ⇒ success (reset retry), `null` ⇒ skip (reset retry, schedule
/// advances regardless), exception ⇒ failure (increment retry, backoff).
/// Returns the backoff to sleep before this launcher is retried, if any.
#[instrument(skip(launcher, queue, state))]
pub async fn run_launcher_once(
    launcher: &Arc<dyn JobLauncher>,
    queue: &JobQueue,
    state: &mut LauncherRetryState,
) -> Option<Duration> {
    match launcher.launch(queue).await {
        Ok(Some(job_id)) => {
            info!(launcher = launcher.name(), job_id = %job_id, "launcher dispatched a job");
            state.reset();
            None
        }
        Ok(None) => {
            state.reset();
            None
        }
        Err(e) => {
            warn!(launcher = launcher.name(), error = %e, "launcher failed, backing off");
            Some(state.backoff_then_increment())
        }
    }
}

pub type LauncherError = JobQueueError;
