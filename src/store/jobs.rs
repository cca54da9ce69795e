// Job queue persistence (§4.7). Claiming and heartbeat follow the same
// atomic-conditional-UPDATE shape as `supabase_repository::fetch_job_for_worker`
// and `recover_stale_jobs`; this module is the ontology-domain equivalent
// against `kg_api.jobs` instead of `indexing_jobs`.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use uuid::Uuid;

use super::base::{GraphStore, StoreError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub job_id: Uuid,
    pub job_type: String,
    pub payload: JsonValue,
    pub status: String,
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
    pub stages: JsonValue,
}

const JOB_COLUMNS: &str = "job_id, job_type, payload, status, is_system_job, auto_approve, attempt, \
    max_retries, created_at, started_at, heartbeat_at, finished_at, error_message, result, stages";

impl GraphStore {
    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue_job(
        &self,
        job_type: &str,
        payload: &JsonValue,
        is_system_job: bool,
        auto_approve: bool,
        max_retries: i32,
    ) -> Result<JobRow, StoreError> {
        let status = if auto_approve { "approved" } else { "pending" };
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO kg_api.jobs
                (job_id, job_type, payload, status, is_system_job, auto_approve, attempt, max_retries, created_at, stages)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, NOW(), '[]'::jsonb)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(job_type)
        .bind(Json(payload.clone()))
        .bind(status)
        .bind(is_system_job)
        .bind(auto_approve)
        .bind(max_retries)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<JobRow>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM kg_api.jobs WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn approve_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.jobs SET status = 'approved' WHERE job_id = $1 AND status IN ('pending', 'awaiting_approval')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn cancel_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.jobs SET status = 'cancelled', finished_at = NOW() WHERE job_id = $1 AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// §4.7 claiming: a single atomic conditional UPDATE, no advisory locks.
    pub async fn fetch_job_for_worker(&self) -> Result<Option<JobRow>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE kg_api.jobs
            SET status = 'running', started_at = NOW(), heartbeat_at = NOW(), attempt = attempt + 1
            WHERE job_id = (
                SELECT job_id FROM kg_api.jobs
                WHERE status = 'approved'
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn heartbeat_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.jobs SET heartbeat_at = NOW() WHERE job_id = $1 AND status = 'running'")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn complete_job(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.jobs SET status = 'completed', result = $2, finished_at = NOW() WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(result.map(Json))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_job(&self, job_id: Uuid, error_message: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.jobs SET status = 'failed', error_message = $2, finished_at = NOW() WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn push_job_stage(&self, job_id: Uuid, stage: &JsonValue) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.jobs SET stages = stages || $2::jsonb WHERE job_id = $1")
            .bind(job_id)
            .bind(Json(JsonValue::Array(vec![stage.clone()])))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// §4.7 heartbeat recovery: a crashed worker's job becomes reclaimable
    /// once its heartbeat goes stale, no supervisor process required.
    pub async fn recover_stale_jobs(&self, stale_after_secs: i64) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE kg_api.jobs
            SET status = 'approved'
            WHERE status = 'running'
                AND heartbeat_at < NOW() - ($1 * INTERVAL '1 second')
            RETURNING job_id
            "#,
        )
        .bind(stale_after_secs)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_columns_list_matches_row_field_count() {
        assert_eq!(JOB_COLUMNS.split(',').count(), 15);
    }
}
