// Ingestion job handler: the queue-side counterpart to `contracts::handle_ingest`,
// grounded on `examples/original_source/api/app/routes/ingest.py`'s
// `queue.enqueue("ingestion", ...)` call, which this worker is the processor
// for. Deserializes the job payload as the same `IngestRequest` DTO a
// synchronous caller would submit, then runs it through the pipeline.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::contracts::{handle_ingest, IngestRequest};
use crate::jobs::{Job, JobHandler};

use super::pipeline::IngestionPipeline;

pub struct IngestionJobHandler {
    pipeline: Arc<IngestionPipeline>,
}

impl IngestionJobHandler {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobHandler for IngestionJobHandler {
    async fn handle(&self, job: &Job, cancel: &AtomicBool) -> anyhow::Result<Option<JsonValue>> {
        let request: IngestRequest = serde_json::from_value(job.payload.clone())?;
        let response = handle_ingest(&self.pipeline, request, Some(job.job_id.as_uuid()), cancel).await?;
        Ok(Some(serde_json::to_value(response)?))
    }
}
