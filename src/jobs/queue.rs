// Job state machine and queue operations (§4.7). `execute_job_async` wraps
// a caller-supplied `JobHandler` with the heartbeat guard, retry/backoff,
// and the DEBUG-vs-ERROR conflict classification the spec requires.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use super::heartbeat::JobHeartbeat;
use crate::pure::backoff::calculate_backoff_duration;
use crate::store::{jobs::JobRow, GraphStore, StoreError};
use crate::types::{JobId, ValidationError};

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("job {job_id} not found")]
    NotFound { job_id: JobId },
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// §4.7 state machine: `pending -> awaiting_approval -> approved -> running
/// -> (completed | failed)`, plus `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    AwaitingApproval,
    Approved,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::AwaitingApproval => "awaiting_approval",
            JobStatus::Approved => "approved",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "awaiting_approval" => JobStatus::AwaitingApproval,
            "approved" => JobStatus::Approved,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStage {
    pub name: String,
    pub percent: u8,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobProgressEvent {
    pub job_id: JobId,
    pub stage: JobStage,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: JobId,
    pub job_type: String,
    pub payload: JsonValue,
    pub status: JobStatus,
    pub is_system_job: bool,
    pub auto_approve: bool,
    pub attempt: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result: Option<JsonValue>,
    pub stages: Vec<JobStage>,
}

impl TryFrom<JobRow> for Job {
    type Error = ValidationError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            job_id: JobId::from_uuid(row.job_id)?,
            job_type: row.job_type,
            payload: row.payload,
            status: JobStatus::parse(&row.status),
            is_system_job: row.is_system_job,
            auto_approve: row.auto_approve,
            attempt: row.attempt,
            max_retries: row.max_retries,
            created_at: row.created_at,
            started_at: row.started_at,
            heartbeat_at: row.heartbeat_at,
            finished_at: row.finished_at,
            error_message: row.error_message,
            result: row.result,
            stages: serde_json::from_value(row.stages).unwrap_or_default(),
        })
    }
}

/// Partial-merge update contract (§4.7: `update_job(job_id, delta)`).
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub error_message: Option<String>,
    pub result: Option<JsonValue>,
    pub push_stage: Option<JobStage>,
}

/// A job-type-specific executor. Ingestion, category-refresh, epistemic
/// remeasurement, and breathing each implement this to plug into
/// `execute_job_async` uniformly.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job, cancel: &AtomicBool) -> anyhow::Result<Option<JsonValue>>;
}

/// §4.7: distinguish expected idempotent conflicts (vertex-already-exists,
/// vocabulary-already-registered) from real failures by pattern-matching the
/// error string, so the former log at DEBUG instead of ERROR.
pub fn is_conflict_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already exists") || lower.contains("duplicate key") || lower.contains("conflict")
}

pub struct JobQueue {
    store: Arc<GraphStore>,
    progress: DashMap<JobId, broadcast::Sender<JobProgressEvent>>,
    heartbeat_period: Duration,
    stale_after_secs: i64,
}

impl JobQueue {
    pub fn new(store: Arc<GraphStore>, heartbeat_period: Duration, stale_after_secs: i64) -> Self {
        Self {
            store,
            progress: DashMap::new(),
            heartbeat_period,
            stale_after_secs,
        }
    }

    #[instrument(skip(self, payload))]
    pub async fn enqueue(
        &self,
        job_type: &str,
        payload: JsonValue,
        is_system_job: bool,
        auto_approve: bool,
        max_retries: i32,
    ) -> Result<JobId, JobQueueError> {
        let row = self
            .store
            .enqueue_job(job_type, &payload, is_system_job, auto_approve, max_retries)
            .await?;
        Ok(JobId::from_uuid(row.job_id)?)
    }

    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: JobId) -> Result<Option<Job>, JobQueueError> {
        match self.store.get_job(job_id.as_uuid()).await? {
            Some(row) => Ok(Some(Job::try_from(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn update_job(&self, job_id: JobId, delta: JobUpdate) -> Result<(), JobQueueError> {
        if let Some(status) = delta.status {
            match status {
                JobStatus::Completed => self.store.complete_job(job_id.as_uuid(), delta.result.clone()).await?,
                JobStatus::Failed => {
                    self.store
                        .fail_job(job_id.as_uuid(), delta.error_message.as_deref().unwrap_or("unknown error"))
                        .await?
                }
                JobStatus::Approved => self.store.approve_job(job_id.as_uuid()).await?,
                JobStatus::Cancelled => self.store.cancel_job(job_id.as_uuid()).await?,
                _ => {}
            }
        }
        if let Some(stage) = delta.push_stage {
            let stage_json = serde_json::to_value(&stage).unwrap_or(JsonValue::Null);
            self.store.push_job_stage(job_id.as_uuid(), &stage_json).await?;
            self.publish_progress(job_id, stage);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, job_id: JobId) -> Result<(), JobQueueError> {
        Ok(self.store.approve_job(job_id.as_uuid()).await?)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, job_id: JobId) -> Result<(), JobQueueError> {
        Ok(self.store.cancel_job(job_id.as_uuid()).await?)
    }

    /// §4.7 claiming: single atomic `UPDATE ... FOR UPDATE SKIP LOCKED`.
    #[instrument(skip(self))]
    pub async fn fetch_job_for_worker(&self) -> Result<Option<Job>, JobQueueError> {
        match self.store.fetch_job_for_worker().await? {
            Some(row) => Ok(Some(Job::try_from(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn recover_stale_jobs(&self) -> Result<Vec<JobId>, JobQueueError> {
        let recovered = self.store.recover_stale_jobs(self.stale_after_secs).await?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "recovered stale jobs with expired heartbeats");
        }
        recovered
            .into_iter()
            .map(|id| JobId::from_uuid(id).map_err(JobQueueError::from))
            .collect()
    }

    /// Subscribe to progress events for a job; creates the channel lazily.
    pub fn subscribe_progress(&self, job_id: JobId) -> broadcast::Receiver<JobProgressEvent> {
        self.progress
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe()
    }

    fn publish_progress(&self, job_id: JobId, stage: JobStage) {
        if let Some(sender) = self.progress.get(&job_id) {
            let _ = sender.send(JobProgressEvent { job_id, stage });
        }
    }

    /// Claim and run one job with a handler matching its `job_type`,
    /// applying the heartbeat guard and retry/backoff policy (§4.7, §5
    /// cancellation). Returns `Ok(false)` when no job was available.
    #[instrument(skip(self, handler, cancel))]
    pub async fn execute_job_async(
        self: &Arc<Self>,
        handler: Arc<dyn JobHandler>,
        cancel: Arc<AtomicBool>,
    ) -> Result<bool, JobQueueError> {
        let Some(job) = self.fetch_job_for_worker().await? else {
            return Ok(false);
        };
        self.run_claimed(job, handler, cancel).await?;
        Ok(true)
    }

    /// Claims the next approved job of any type and dispatches it to
    /// whichever registered handler matches its `job_type`. Used by the
    /// scheduler so one drain loop serves every launcher-enqueued job type
    /// (§4.6: launcher jobs are "executed immediately").
    #[instrument(skip(self, handlers, cancel))]
    pub async fn dispatch_next(
        self: &Arc<Self>,
        handlers: &std::collections::HashMap<&'static str, Arc<dyn JobHandler>>,
        cancel: Arc<AtomicBool>,
    ) -> Result<bool, JobQueueError> {
        let Some(job) = self.fetch_job_for_worker().await? else {
            return Ok(false);
        };
        let Some(handler) = handlers.get(job.job_type.as_str()).cloned() else {
            warn!(job_id = %job.job_id, job_type = %job.job_type, "no handler registered for job type");
            self.store.fail_job(job.job_id.as_uuid(), "no handler registered for job type").await?;
            return Ok(true);
        };
        self.run_claimed(job, handler, cancel).await?;
        Ok(true)
    }

    async fn run_claimed(
        self: &Arc<Self>,
        job: Job,
        handler: Arc<dyn JobHandler>,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), JobQueueError> {
        let _heartbeat = JobHeartbeat::start(self.store.clone(), job.job_id.as_uuid(), self.heartbeat_period);

        match handler.handle(&job, &cancel).await {
            Ok(result) => {
                self.store.complete_job(job.job_id.as_uuid(), result).await?;
                info!(job_id = %job.job_id, job_type = %job.job_type, "job completed");
            }
            Err(e) => {
                let message = e.to_string();
                if is_conflict_error(&message) {
                    debug!(job_id = %job.job_id, error = %message, "job hit an expected idempotent conflict");
                } else {
                    error!(job_id = %job.job_id, error = %message, "job failed");
                }

                if job.attempt < job.max_retries {
                    let backoff = calculate_backoff_duration(job.attempt as u32, Duration::from_secs(1), Duration::from_secs(300));
                    warn!(job_id = %job.job_id, attempt = job.attempt, backoff_ms = backoff.as_millis() as u64, "retrying job after backoff");
                    tokio::time::sleep(backoff).await;
                    self.store.approve_job(job.job_id.as_uuid()).await?;
                } else {
                    self.store.fail_job(job.job_id.as_uuid(), &message).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_are_recognized_case_insensitively() {
        assert!(is_conflict_error("Vertex already exists"));
        assert!(is_conflict_error("duplicate key value violates unique constraint"));
        assert!(!is_conflict_error("connection refused"));
    }

    #[test]
    fn job_status_strings_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::AwaitingApproval,
            JobStatus::Approved,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), status);
        }
    }
}
