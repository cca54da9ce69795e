// Centralized observability infrastructure: structured logging, metrics, tracing.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);
static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);
static INGESTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize logging with the default (non-verbose, non-quiet) configuration.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity.
///
/// Precedence: `quiet` > `RUST_LOG` env var > `verbose` > default directive.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("ontology_core=debug,info")
    } else {
        EnvFilter::new("ontology_core=info,sqlx=warn")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                info!("ontology-core observability initialized");
            }
            Ok(())
        }
        Err(_) => Ok(()), // already initialized, fine in tests
    }
}

/// Structured event kinds emitted across the four subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    StoreRead {
        query_shape: String,
    },
    StoreWrite {
        entity: String,
    },
    VocabCategorize {
        relationship_type: String,
        confidence: f64,
    },
    GroundingCompute {
        concept_id: Uuid,
    },
    EpistemicMeasure {
        vocab_type: String,
        sampled: usize,
    },
    JobClaim {
        job_id: Uuid,
        job_type: String,
    },
    JobComplete {
        job_id: Uuid,
    },
    JobFail {
        job_id: Uuid,
        retryable: bool,
    },
    LauncherCheck {
        launcher: String,
    },
    LauncherSkip {
        launcher: String,
    },
    Breathing {
        epoch: i64,
    },
}

impl Operation {
    pub fn validate(&self) -> Result<()> {
        match self {
            Operation::VocabCategorize { confidence, .. } => {
                if !(0.0..=1.0).contains(confidence) {
                    anyhow::bail!("category confidence out of range: {confidence}");
                }
            }
            Operation::EpistemicMeasure { sampled, .. } => {
                // sampled may legitimately be 0 (no edges of this type yet)
                let _ = sampled;
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter { name: &'static str, value: u64 },
    Gauge { name: &'static str, value: f64 },
    Histogram { name: &'static str, value: f64, unit: &'static str },
    Timer { name: &'static str, duration: Duration },
}

/// Carries a trace/span id pair through a logical operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub operation: String,
    pub start_time: Instant,
    pub attributes: Vec<(String, String)>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn child(&self, operation: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Log an operation at INFO on success; expected conflicts should be logged
/// by the caller at DEBUG instead of routed through here (§4.7, §6a).
#[instrument(skip(ctx, op, result))]
pub fn log_operation(ctx: &OperationContext, op: &Operation, result: &Result<()>) {
    let elapsed = ctx.elapsed();
    match result {
        Ok(()) => {
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                "operation completed: {:?}", op
            );
            OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "operation failed: {:?}", op
            );
            ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
    }

    match op {
        Operation::JobClaim { .. } | Operation::JobComplete { .. } | Operation::JobFail { .. } => {
            JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Operation::StoreWrite { entity } if entity == "document_meta" => {
            INGESTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        _ => {}
    }
}

pub fn record_metric(metric: MetricType) {
    match metric {
        MetricType::Counter { name, value } => debug!("metric.counter {} = {}", name, value),
        MetricType::Gauge { name, value } => debug!("metric.gauge {} = {}", name, value),
        MetricType::Histogram { name, value, unit } => {
            debug!("metric.histogram {} = {} {}", name, value, unit)
        }
        MetricType::Timer { name, duration } => debug!("metric.timer {} = {:?}", name, duration),
    }
}

pub fn get_metrics() -> serde_json::Value {
    serde_json::json!({
        "operations": {
            "total": OPERATION_COUNTER.load(Ordering::Relaxed),
            "errors": ERROR_COUNTER.load(Ordering::Relaxed),
            "jobs": JOB_COUNTER.load(Ordering::Relaxed),
            "ingestions": INGESTION_COUNTER.load(Ordering::Relaxed),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })
}

/// Performance timer that logs its own duration on drop.
pub struct PerfTimer {
    name: String,
    start: Instant,
    ctx: OperationContext,
}

impl PerfTimer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ctx = OperationContext::new(&name);
        info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, "timer started: {}", name);
        Self {
            name,
            start: Instant::now(),
            ctx,
        }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!(
            trace_id = %self.ctx.trace_id,
            span_id = %self.ctx.span_id,
            elapsed_ms = elapsed.as_millis(),
            "timer completed: {}", self.name
        );
        record_metric(MetricType::Timer {
            name: "perf.timer",
            duration: elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_context_child_links_trace() {
        let ctx = OperationContext::new("ingest");
        let child = ctx.child("chunk");
        assert_eq!(child.trace_id, ctx.trace_id);
        assert_eq!(child.parent_span_id, Some(ctx.span_id));
    }

    #[test]
    fn category_confidence_validation() {
        let op = Operation::VocabCategorize {
            relationship_type: "OPTIMIZES_FOR".to_string(),
            confidence: 1.5,
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn metrics_snapshot_has_expected_shape() {
        record_metric(MetricType::Counter {
            name: "test.counter",
            value: 1,
        });
        let metrics = get_metrics();
        assert!(metrics["operations"].is_object());
        assert!(metrics["timestamp"].is_string());
    }

    #[test]
    fn logging_filters_parse() {
        for filter in ["error", "ontology_core=debug,info", "ontology_core=info,sqlx=warn"] {
            assert!(EnvFilter::try_new(filter).is_ok());
        }
    }
}
