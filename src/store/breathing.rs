// Breathing-cycle tunables and the atomic epoch claim (§4.6). The claim
// query is the same atomic-conditional-UPDATE shape as `fetch_job_for_worker`
// (§4.7) and `write_document_meta_and_advance_epoch`'s counter bump
// (`store::ingestion`) — no advisory locks anywhere in this crate.

use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use super::base::{GraphStore, StoreError};
use crate::types::{ConceptId, ProposalId, ProposalKind};

/// §4.6 tunables, with code defaults used whenever `kg_api.breathing_options`
/// is empty, missing a key, or holds a value that fails to coerce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreathingOptions {
    pub epoch_interval: i64,
    pub demotion_threshold: f64,
    pub promotion_min_degree: i64,
    pub max_proposals: i64,
    pub enabled: bool,
    pub derive_edges: bool,
    pub overlap_threshold: f64,
    pub specializes_threshold: f64,
}

impl Default for BreathingOptions {
    fn default() -> Self {
        Self {
            epoch_interval: 5,
            demotion_threshold: 0.15,
            promotion_min_degree: 10,
            max_proposals: 5,
            enabled: true,
            derive_edges: true,
            overlap_threshold: 0.1,
            specializes_threshold: 0.3,
        }
    }
}

impl GraphStore {
    /// §4.6: "a failed options read ... logs a warning and proceeds with the
    /// full code-default set rather than failing `check_conditions()`".
    /// Options are stored one-row-per-key so a single bad row cannot poison
    /// the rest; each key falls back to its own default independently.
    pub async fn get_breathing_options(&self) -> BreathingOptions {
        let mut options = BreathingOptions::default();
        let rows = match sqlx::query("SELECT option_key, option_value FROM kg_api.breathing_options")
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "breathing_options unreadable, using code defaults");
                return options;
            }
        };

        for row in rows {
            let (key, value): (String, JsonValue) = match (row.try_get(0), row.try_get(1)) {
                (Ok(k), Ok(v)) => (k, v),
                _ => continue,
            };
            apply_option(&mut options, &key, &value);
        }
        options
    }

    /// §4.6: "an atomic `UPDATE ... WHERE current_epoch - last_breathing_epoch
    /// >= interval RETURNING counter` to simultaneously check and claim the
    /// epoch window, preventing double-dispatch from concurrent triggers."
    /// Returns `Some(new_epoch)` for the caller that wins the race; `None`
    /// for every other concurrent caller, and for a caller outside the window.
    pub async fn claim_breathing_epoch(&self, interval: i64) -> Result<Option<i64>, StoreError> {
        let claimed: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE public.graph_metrics AS lb
            SET counter = de.counter, updated_at = NOW()
            FROM public.graph_metrics AS de
            WHERE lb.metric_name = 'last_breathing_epoch'
                AND de.metric_name = 'document_ingestion_counter'
                AND de.counter - lb.counter >= $1
            RETURNING lb.counter
            "#,
        )
        .bind(interval)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed.map(|(epoch,)| epoch))
    }

    /// §4.6 annealing: record a promote/demote/merge suggestion,
    /// `pending` unless autonomous mode already resolved it.
    pub async fn record_annealing_proposal(
        &self,
        concept_id: ConceptId,
        kind: ProposalKind,
        rationale: &str,
        autonomous: bool,
    ) -> Result<ProposalId, StoreError> {
        let id = Uuid::new_v4();
        let kind_str = proposal_kind_str(kind);
        let status_str = if autonomous { "approved" } else { "pending" };
        sqlx::query(
            r#"
            INSERT INTO kg_api.annealing_proposals
                (proposal_id, concept_id, kind, status, rationale, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(id)
        .bind(concept_id.as_uuid())
        .bind(kind_str)
        .bind(status_str)
        .bind(rationale)
        .execute(&self.pool)
        .await?;
        ProposalId::from_uuid(id).map_err(|e| StoreError::MalformedRow(e.to_string()))
    }

    pub async fn mark_proposal_executed(&self, proposal_id: ProposalId) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.annealing_proposals SET status = 'executed', reviewed_at = NOW() WHERE proposal_id = $1",
        )
        .bind(proposal_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_pending_proposals(&self) -> Result<Vec<(ProposalId, ConceptId, ProposalKind)>, StoreError> {
        let rows: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT proposal_id, concept_id, kind FROM kg_api.annealing_proposals WHERE status = 'pending'",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (proposal_uuid, concept_uuid, kind_raw) in rows {
            let Some(kind) = parse_proposal_kind(&kind_raw) else { continue };
            let Ok(proposal_id) = ProposalId::from_uuid(proposal_uuid) else { continue };
            let Ok(concept_id) = ConceptId::from_uuid(concept_uuid) else { continue };
            out.push((proposal_id, concept_id, kind));
        }
        Ok(out)
    }
}

fn proposal_kind_str(kind: ProposalKind) -> &'static str {
    match kind {
        ProposalKind::Promote => "promote",
        ProposalKind::Demote => "demote",
        ProposalKind::Merge => "merge",
    }
}

fn parse_proposal_kind(raw: &str) -> Option<ProposalKind> {
    match raw {
        "promote" => Some(ProposalKind::Promote),
        "demote" => Some(ProposalKind::Demote),
        "merge" => Some(ProposalKind::Merge),
        _ => None,
    }
}

fn apply_option(options: &mut BreathingOptions, key: &str, value: &JsonValue) {
    match key {
        "epoch_interval" => {
            if let Some(v) = value.as_i64() {
                options.epoch_interval = v;
            }
        }
        "demotion_threshold" => {
            if let Some(v) = value.as_f64() {
                options.demotion_threshold = v;
            }
        }
        "promotion_min_degree" => {
            if let Some(v) = value.as_i64() {
                options.promotion_min_degree = v;
            }
        }
        "max_proposals" => {
            if let Some(v) = value.as_i64() {
                options.max_proposals = v;
            }
        }
        "enabled" => {
            if let Some(v) = value.as_bool() {
                options.enabled = v;
            }
        }
        "derive_edges" => {
            if let Some(v) = value.as_bool() {
                options.derive_edges = v;
            }
        }
        "overlap_threshold" => {
            if let Some(v) = value.as_f64() {
                options.overlap_threshold = v;
            }
        }
        "specializes_threshold" => {
            if let Some(v) = value.as_f64() {
                options.specializes_threshold = v;
            }
        }
        other => warn!(key = %other, "ignoring unrecognized breathing option"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_tunables() {
        let options = BreathingOptions::default();
        assert_eq!(options.epoch_interval, 5);
        assert_eq!(options.promotion_min_degree, 10);
        assert_eq!(options.max_proposals, 5);
        assert!(options.enabled);
        assert!(options.derive_edges);
    }

    #[test]
    fn unknown_option_keys_leave_defaults_untouched() {
        let mut options = BreathingOptions::default();
        apply_option(&mut options, "nonsense", &JsonValue::Bool(false));
        assert_eq!(options, BreathingOptions::default());
    }

    #[test]
    fn recognized_keys_override_their_default() {
        let mut options = BreathingOptions::default();
        apply_option(&mut options, "epoch_interval", &JsonValue::from(12));
        apply_option(&mut options, "enabled", &JsonValue::Bool(false));
        assert_eq!(options.epoch_interval, 12);
        assert!(!options.enabled);
    }
}
