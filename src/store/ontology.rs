// Ontology CRUD and lifecycle transitions (§3, §4.1 race handling).
// Grounded on `supabase_repository/mod.rs`'s `ON CONFLICT ... DO UPDATE`
// upsert idiom, adapted to the "get -> create -> on-conflict get" loop §4.1
// specifies for nodes that may be created concurrently.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use uuid::Uuid;

use super::base::{GraphStore, StoreError};
use crate::types::{OntologyId, OntologyLifecycle};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OntologyRow {
    pub ontology_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub embedding: Option<JsonValue>,
    pub search_terms: JsonValue,
    pub lifecycle_state: String,
    pub creation_epoch: i64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OntologyRow {
    pub fn lifecycle(&self) -> OntologyLifecycle {
        match self.lifecycle_state.as_str() {
            "pinned" => OntologyLifecycle::Pinned,
            "frozen" => OntologyLifecycle::Frozen,
            _ => OntologyLifecycle::Active,
        }
    }
}

fn lifecycle_str(state: OntologyLifecycle) -> &'static str {
    match state {
        OntologyLifecycle::Active => "active",
        OntologyLifecycle::Pinned => "pinned",
        OntologyLifecycle::Frozen => "frozen",
    }
}

impl GraphStore {
    pub async fn get_ontology_by_name(&self, name: &str) -> Result<Option<OntologyRow>, StoreError> {
        let row = sqlx::query_as::<_, OntologyRow>(
            r#"
            SELECT ontology_id, name, description, embedding, search_terms,
                   lifecycle_state, creation_epoch, created_by, created_at
            FROM kg_api.ontology
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Get-create-get: the loser of a concurrent create re-reads the
    /// winner's row instead of failing (§4.1, §5 shared-resource discipline).
    pub async fn get_or_create_ontology(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<OntologyRow, StoreError> {
        if let Some(existing) = self.get_ontology_by_name(name).await? {
            return Ok(existing);
        }

        let inserted = sqlx::query_as::<_, OntologyRow>(
            r#"
            INSERT INTO kg_api.ontology (ontology_id, name, description, search_terms, lifecycle_state, creation_epoch, created_by)
            VALUES ($1, $2, $3, '[]'::jsonb, 'active', 0, $4)
            ON CONFLICT (name) DO NOTHING
            RETURNING ontology_id, name, description, embedding, search_terms,
                      lifecycle_state, creation_epoch, created_by, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(created_by)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(row),
            None => {
                // Lost the race: the winner's row now exists.
                self.get_ontology_by_name(name)
                    .await?
                    .ok_or_else(|| StoreError::MalformedRow(format!("ontology {name} vanished after conflict")))
            }
        }
    }

    pub async fn get_ontology(&self, id: OntologyId) -> Result<Option<OntologyRow>, StoreError> {
        let row = sqlx::query_as::<_, OntologyRow>(
            r#"
            SELECT ontology_id, name, description, embedding, search_terms,
                   lifecycle_state, creation_epoch, created_by, created_at
            FROM kg_api.ontology
            WHERE ontology_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_embedding(&self, id: OntologyId, embedding: &[f32]) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.ontology SET embedding = $1 WHERE ontology_id = $2")
            .bind(Json(embedding))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lifecycle transitions named in §3: `active -> pinned | frozen`,
    /// `pinned <-> active`, `frozen -> active`. The caller enforces which
    /// transitions are admin-gated; the store applies whatever it is asked.
    pub async fn set_lifecycle(&self, id: OntologyId, state: OntologyLifecycle) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.ontology SET lifecycle_state = $1 WHERE ontology_id = $2")
            .bind(lifecycle_str(state))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trips_through_its_string_form() {
        for state in [OntologyLifecycle::Active, OntologyLifecycle::Pinned, OntologyLifecycle::Frozen] {
            let s = lifecycle_str(state);
            let row = OntologyRow {
                ontology_id: Uuid::new_v4(),
                name: "x".into(),
                description: None,
                embedding: None,
                search_terms: JsonValue::Array(vec![]),
                lifecycle_state: s.to_string(),
                creation_epoch: 0,
                created_by: None,
                created_at: Utc::now(),
            };
            assert_eq!(row.lifecycle(), state);
        }
    }
}
