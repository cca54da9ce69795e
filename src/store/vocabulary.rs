// VocabType / VocabCategory CRUD, merge, and sync (§4.3, §7 table
// `kg_api.relationship_vocabulary`). The get-create-get and
// `ON CONFLICT DO NOTHING` patterns follow `store::ontology`; the merge
// transaction follows §4.3's "create-new-delete-old within a single
// transaction" requirement since AGE cannot rename an edge's label in place.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;

use super::base::{GraphStore, StoreError};
use crate::types::{CategorySource, DirectionSemantics, EpistemicStatus, VocabCategory, VocabName};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VocabTypeRow {
    pub relationship_type: String,
    pub description: Option<String>,
    pub category: String,
    pub is_active: bool,
    pub is_builtin: bool,
    pub usage_count: i64,
    pub direction_semantics: String,
    pub embedding: Option<JsonValue>,
    pub embedding_model: Option<String>,
    pub embedding_generated_at: Option<DateTime<Utc>>,
    pub category_source: String,
    pub category_confidence: Option<f64>,
    pub category_scores: Option<JsonValue>,
    pub category_ambiguous: Option<bool>,
    pub epistemic_status: Option<String>,
    pub deprecation_reason: Option<String>,
}

impl VocabTypeRow {
    pub fn category(&self) -> Option<VocabCategory> {
        VocabCategory::ALL.iter().copied().find(|c| format!("{c:?}").eq_ignore_ascii_case(&self.category))
    }

    pub fn category_source(&self) -> CategorySource {
        match self.category_source.as_str() {
            "computed" => CategorySource::Computed,
            _ => CategorySource::AssignedAtCreation,
        }
    }

    pub fn direction(&self) -> DirectionSemantics {
        match self.direction_semantics.as_str() {
            "inward" => DirectionSemantics::Inward,
            "bidirectional" => DirectionSemantics::Bidirectional,
            _ => DirectionSemantics::Outward,
        }
    }

    pub fn epistemic_status(&self) -> Option<EpistemicStatus> {
        match self.epistemic_status.as_deref() {
            Some("WELL_GROUNDED") => Some(EpistemicStatus::WellGrounded),
            Some("MIXED_GROUNDING") => Some(EpistemicStatus::MixedGrounding),
            Some("WEAK_GROUNDING") => Some(EpistemicStatus::WeakGrounding),
            Some("POORLY_GROUNDED") => Some(EpistemicStatus::PoorlyGrounded),
            Some("CONTRADICTED") => Some(EpistemicStatus::Contradicted),
            Some("HISTORICAL") => Some(EpistemicStatus::Historical),
            Some("INSUFFICIENT_DATA") => Some(EpistemicStatus::InsufficientData),
            _ => None,
        }
    }
}

const VOCAB_COLUMNS: &str = "relationship_type, description, category, is_active, is_builtin, usage_count, \
    direction_semantics, embedding, embedding_model, embedding_generated_at, category_source, \
    category_confidence, category_scores, category_ambiguous, epistemic_status, deprecation_reason";

impl GraphStore {
    pub async fn get_vocab_type(&self, name: &VocabName) -> Result<Option<VocabTypeRow>, StoreError> {
        let row = sqlx::query_as::<_, VocabTypeRow>(&format!(
            "SELECT {VOCAB_COLUMNS} FROM kg_api.relationship_vocabulary WHERE relationship_type = $1"
        ))
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_vocab_types(&self) -> Result<Vec<VocabTypeRow>, StoreError> {
        let rows = sqlx::query_as::<_, VocabTypeRow>(&format!(
            "SELECT {VOCAB_COLUMNS} FROM kg_api.relationship_vocabulary ORDER BY relationship_type"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get-create-get for VocabType creation, mirroring `store::ontology`
    /// (§5: "Vocabulary table - writes use `ON CONFLICT DO NOTHING`").
    #[allow(clippy::too_many_arguments)]
    pub async fn get_or_create_vocab_type(
        &self,
        name: &VocabName,
        description: Option<&str>,
        category: VocabCategory,
        category_source: CategorySource,
        is_builtin: bool,
        direction: DirectionSemantics,
    ) -> Result<VocabTypeRow, StoreError> {
        if let Some(existing) = self.get_vocab_type(name).await? {
            return Ok(existing);
        }

        let category_str = format!("{category:?}").to_lowercase();
        let category_source_str = match category_source {
            CategorySource::AssignedAtCreation => "assigned_at_creation",
            CategorySource::Computed => "computed",
        };
        let direction_str = match direction {
            DirectionSemantics::Outward => "outward",
            DirectionSemantics::Inward => "inward",
            DirectionSemantics::Bidirectional => "bidirectional",
        };

        let inserted = sqlx::query_as::<_, VocabTypeRow>(&format!(
            "INSERT INTO kg_api.relationship_vocabulary \
             (relationship_type, description, category, is_active, is_builtin, usage_count, direction_semantics, category_source) \
             VALUES ($1, $2, $3, true, $4, 0, $5, $6) \
             ON CONFLICT (relationship_type) DO NOTHING \
             RETURNING {VOCAB_COLUMNS}"
        ))
        .bind(name.as_str())
        .bind(description)
        .bind(&category_str)
        .bind(is_builtin)
        .bind(direction_str)
        .bind(category_source_str)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(row),
            None => self
                .get_vocab_type(name)
                .await?
                .ok_or_else(|| StoreError::MalformedRow(format!("vocab type {name} vanished after conflict"))),
        }
    }

    pub async fn set_vocab_embedding(
        &self,
        name: &VocabName,
        embedding: &[f32],
        model: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.relationship_vocabulary \
             SET embedding = $1, embedding_model = $2, embedding_generated_at = NOW() \
             WHERE relationship_type = $3",
        )
        .bind(Json(embedding))
        .bind(model)
        .bind(name.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_category_assignment(
        &self,
        name: &VocabName,
        category: VocabCategory,
        confidence: f64,
        scores: &JsonValue,
        ambiguous: bool,
    ) -> Result<(), StoreError> {
        let category_str = format!("{category:?}").to_lowercase();
        sqlx::query(
            "UPDATE kg_api.relationship_vocabulary \
             SET category = $1, category_source = 'computed', category_confidence = $2, \
                 category_scores = $3, category_ambiguous = $4 \
             WHERE relationship_type = $5",
        )
        .bind(&category_str)
        .bind(confidence)
        .bind(scores)
        .bind(ambiguous)
        .bind(name.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_epistemic_status(
        &self,
        name: &VocabName,
        status: EpistemicStatus,
        rationale: &str,
        stats: &JsonValue,
    ) -> Result<(), StoreError> {
        let status_str = format!("{status:?}");
        let screaming = to_screaming_snake(&status_str);
        sqlx::query(
            "UPDATE kg_api.relationship_vocabulary \
             SET epistemic_status = $1, epistemic_rationale = $2, epistemic_measured_at = NOW(), epistemic_stats = $3 \
             WHERE relationship_type = $4",
        )
        .bind(&screaming)
        .bind(rationale)
        .bind(stats)
        .bind(name.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn increment_usage_count(&self, name: &VocabName) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.relationship_vocabulary SET usage_count = usage_count + 1 WHERE relationship_type = $1")
            .bind(name.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `merge(deprecated, target)`: rewrite every `C1 -[:deprecated]-> C2` to
    /// `C1 -[:target]-> C2`, mark `deprecated` inactive, write a history row,
    /// all inside one transaction (§4.3).
    pub async fn merge_vocab_types(
        &self,
        deprecated: &VocabName,
        target: &VocabName,
        reason: &str,
        performed_by: Option<&str>,
    ) -> Result<u64, StoreError> {
        super::base::validate_identifier(deprecated.as_str())?;
        super::base::validate_identifier(target.as_str())?;

        let mut tx = self.pool.begin().await?;

        let cypher = format!(
            "MATCH (a)-[r:{deprecated}]->(b) CREATE (a)-[r2:{target}]->(b) SET r2 = properties(r) DELETE r RETURN count(r2)"
        );
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher${}$cypher$) AS (moved agtype)",
            super::base::GRAPH_NAME,
            cypher
        );
        let row = sqlx::query(&sql).fetch_optional(&mut *tx).await?;
        let moved_count = row
            .map(|r| {
                use sqlx::Row;
                let raw: String = r.try_get(0).unwrap_or_else(|_| "0".to_string());
                raw.trim_end_matches("::numeric").parse::<u64>().unwrap_or(0)
            })
            .unwrap_or(0);

        sqlx::query(
            "UPDATE kg_api.relationship_vocabulary SET is_active = false, deprecation_reason = $1 WHERE relationship_type = $2",
        )
        .bind(reason)
        .bind(deprecated.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO kg_api.vocabulary_history (relationship_type, action, performed_by, target_type, reason, timestamp) \
             VALUES ($1, 'merged', $2, $3, $4, NOW())",
        )
        .bind(deprecated.as_str())
        .bind(performed_by)
        .bind(target.as_str())
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(moved_count)
    }

    /// Records a failed graph-side repair alongside a successful relational
    /// write, per the open-question resolution in DESIGN.md: the relational
    /// row is the durable source of truth even when the graph mutation it
    /// describes could not be completed transactionally.
    pub async fn record_repair_needed(&self, name: &VocabName, context: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kg_api.vocabulary_history (relationship_type, action, performed_by, target_type, reason, timestamp) \
             VALUES ($1, 'graph_write_failed', NULL, NULL, $2, NOW())",
        )
        .bind(name.as_str())
        .bind(context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// §4.3 sync: edge labels present in the graph but absent from
    /// `relationship_vocabulary` (used-but-never-registered types).
    pub async fn find_unregistered_labels(&self) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher$MATCH ()-[r]->() RETURN DISTINCT label(r)$cypher$) AS (label agtype)",
            super::base::GRAPH_NAME
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut labels = Vec::new();
        for row in rows {
            use sqlx::Row;
            let raw: String = row.try_get(0).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            labels.push(raw.trim_matches('"').to_string());
        }

        let registered = self.list_vocab_types().await?;
        let registered_names: std::collections::HashSet<String> =
            registered.into_iter().map(|r| r.relationship_type).collect();
        Ok(labels.into_iter().filter(|l| !registered_names.contains(l)).collect())
    }

    /// Bumps the vocabulary mutation counter consulted by
    /// `EpistemicRemeasurementLauncher` (§4.6). Upserts since the metric row
    /// may not have been seeded yet on a fresh database.
    pub async fn bump_vocabulary_change_counter(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO public.graph_metrics (metric_name, counter, updated_at)
            VALUES ('vocabulary_change_counter', 1, NOW())
            ON CONFLICT (metric_name) DO UPDATE
                SET counter = public.graph_metrics.counter + 1, updated_at = NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// §4.6 condition: `vocabulary_change_counter` delta since the last
    /// completed remeasurement cycle, tracked via a second metric row rather
    /// than resetting the counter itself (so concurrent bumps are never lost).
    pub async fn vocabulary_change_delta(&self) -> Result<i64, StoreError> {
        let current: i64 = sqlx::query_scalar(
            "SELECT COALESCE((SELECT counter FROM public.graph_metrics WHERE metric_name = 'vocabulary_change_counter'), 0)",
        )
        .fetch_one(&self.pool)
        .await?;
        let last_measured: i64 = sqlx::query_scalar(
            "SELECT COALESCE((SELECT counter FROM public.graph_metrics WHERE metric_name = 'vocabulary_change_counter_last_measured'), 0)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(current - last_measured)
    }

    pub async fn mark_vocabulary_measurement_complete(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO public.graph_metrics (metric_name, counter, updated_at)
            SELECT 'vocabulary_change_counter_last_measured', COALESCE(counter, 0), NOW()
            FROM public.graph_metrics WHERE metric_name = 'vocabulary_change_counter'
            ON CONFLICT (metric_name) DO UPDATE
                SET counter = EXCLUDED.counter, updated_at = NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn to_screaming_snake(pascal: &str) -> String {
    let mut out = String::new();
    for (i, ch) in pascal.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_to_screaming_snake() {
        assert_eq!(to_screaming_snake("WellGrounded"), "WELL_GROUNDED");
        assert_eq!(to_screaming_snake("InsufficientData"), "INSUFFICIENT_DATA");
    }

    #[test]
    fn category_column_matches_variant_debug_lowercased() {
        let row = VocabTypeRow {
            relationship_type: "SUPPORTS".into(),
            description: None,
            category: "evidential".into(),
            is_active: true,
            is_builtin: true,
            usage_count: 0,
            direction_semantics: "outward".into(),
            embedding: None,
            embedding_model: None,
            embedding_generated_at: None,
            category_source: "assigned_at_creation".into(),
            category_confidence: None,
            category_scores: None,
            category_ambiguous: None,
            epistemic_status: None,
            deprecation_reason: None,
        };
        assert_eq!(row.category(), Some(VocabCategory::Evidential));
        assert_eq!(row.category_source(), CategorySource::AssignedAtCreation);
    }
}
