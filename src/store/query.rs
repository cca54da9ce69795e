// Read-only traversal: concept similarity search, grounding edge fetch, and
// batched vocabulary-embedding fetch (§4.4 concept matching, §4.5 batch API:
// "two queries ... plus local math, never per-concept round-trips").

use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::base::{GraphStore, StoreError};
use crate::pure::cosine_similarity;
use crate::types::{ConceptId, VocabName};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConceptRow {
    pub concept_id: Uuid,
    pub label: String,
    pub description: Option<String>,
    pub embedding: Option<JsonValue>,
    pub search_terms: JsonValue,
    pub created_at_epoch: i64,
    pub last_seen_epoch: i64,
    pub seen_count: i64,
    pub creation_method: Option<String>,
    pub ontology: String,
}

#[derive(Debug, Clone)]
pub struct ConceptMatch {
    pub concept_id: ConceptId,
    pub similarity: f32,
}

fn decode_embedding(value: &Option<JsonValue>) -> Option<Vec<f32>> {
    value.as_ref().and_then(|v| serde_json::from_value::<Vec<f32>>(v.clone()).ok())
}

impl GraphStore {
    /// §4.4 step 3 concept matching: vector similarity over existing
    /// concepts in the same ontology. Fetches candidates then scores in
    /// Rust rather than relying on a DB-side vector index, matching the
    /// "no vector-index crate" decision in DESIGN.md.
    pub async fn find_similar_concepts(
        &self,
        ontology: &str,
        candidate_embedding: &[f32],
        threshold: f32,
    ) -> Result<Vec<ConceptMatch>, StoreError> {
        let rows = sqlx::query_as::<_, ConceptRow>(
            r#"
            SELECT concept_id, label, description, embedding, search_terms,
                   created_at_epoch, last_seen_epoch, seen_count, creation_method, ontology
            FROM kg_api.concept
            WHERE ontology = $1 AND embedding IS NOT NULL
            "#,
        )
        .bind(ontology)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<ConceptMatch> = rows
            .into_iter()
            .filter_map(|row| {
                let embedding = decode_embedding(&row.embedding)?;
                let similarity = cosine_similarity(candidate_embedding, &embedding);
                (similarity >= threshold).then(|| ConceptMatch {
                    concept_id: ConceptId::from_uuid(row.concept_id).ok()?,
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        Ok(matches)
    }

    pub async fn get_concept(&self, id: ConceptId) -> Result<Option<ConceptRow>, StoreError> {
        let row = sqlx::query_as::<_, ConceptRow>(
            r#"
            SELECT concept_id, label, description, embedding, search_terms,
                   created_at_epoch, last_seen_epoch, seen_count, creation_method, ontology
            FROM kg_api.concept
            WHERE concept_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn touch_concept(&self, id: ConceptId, epoch: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kg_api.concept SET last_seen_epoch = $1, seen_count = seen_count + 1 WHERE concept_id = $2",
        )
        .bind(epoch)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// One incoming edge to a concept, with enough to weight a grounding
    /// projection (§4.5 step 4): the edge's vocab type name and confidence.
    pub async fn fetch_incoming_edges_for_grounding(
        &self,
        concept_id: ConceptId,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let cypher = "MATCH (a)-[r]->(b) WHERE id(b) = $target_id RETURN label(r), r.confidence";
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher${}$cypher$, $1) AS (label agtype, confidence agtype)",
            super::base::GRAPH_NAME,
            cypher
        );
        let rows = sqlx::query(&sql)
            .bind(concept_id.as_uuid().to_string())
            .fetch_all(&self.pool)
            .await?;

        use sqlx::Row;
        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            let label: String = row.try_get(0).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            let confidence: String = row.try_get(1).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            edges.push((
                label.trim_matches('"').to_string(),
                confidence.trim_end_matches("::numeric").parse::<f64>().unwrap_or(0.0),
            ));
        }
        Ok(edges)
    }

    /// Target concepts of up to `limit` edges of the given type, for
    /// epistemic-status sampling (§4.5: "sample up to N edges of that
    /// type"). `vocab_type` must already be a validated `VocabName` so
    /// interpolating it into the Cypher label position is safe.
    pub async fn sample_target_concepts_for_vocab_type(
        &self,
        vocab_type: &VocabName,
        limit: i64,
    ) -> Result<Vec<ConceptId>, StoreError> {
        super::base::validate_identifier(vocab_type.as_str())?;
        let cypher = format!(
            "MATCH (a)-[r:{vocab_type}]->(b) RETURN id(b) LIMIT {limit}",
            vocab_type = vocab_type.as_str(),
            limit = limit.max(0)
        );
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher${}$cypher$) AS (target_id agtype)",
            super::base::GRAPH_NAME,
            cypher
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        use sqlx::Row;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.try_get(0).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            let uuid_str = raw.trim_matches('"');
            if let Ok(uuid) = uuid_str.parse::<Uuid>() {
                if let Ok(id) = ConceptId::from_uuid(uuid) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Total edge count of a vocabulary type, for the `total_edges` field of
    /// `GroundingStats` (§4.5 grounding statistics payload).
    pub async fn count_edges_for_vocab_type(&self, vocab_type: &VocabName) -> Result<i64, StoreError> {
        super::base::validate_identifier(vocab_type.as_str())?;
        let cypher = format!(
            "MATCH ()-[r:{vocab_type}]->() RETURN count(r)",
            vocab_type = vocab_type.as_str()
        );
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher${}$cypher$) AS (total agtype)",
            super::base::GRAPH_NAME,
            cypher
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        use sqlx::Row;
        Ok(match row {
            Some(r) => {
                let raw: String = r.try_get(0).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
                raw.trim_end_matches("::numeric").parse::<i64>().unwrap_or(0)
            }
            None => 0,
        })
    }

    /// Candidate pool for a breathing cycle (§4.6 annealing): the most
    /// recently touched concepts together with their total degree, so the
    /// worker can score promotion (`degree >= promotion_min_degree`) and
    /// demotion (weak grounding) without a full-graph scan.
    pub async fn sample_concepts_for_annealing(&self, limit: i64) -> Result<Vec<(ConceptId, i64)>, StoreError> {
        let cypher = format!(
            "MATCH (c) OPTIONAL MATCH (c)-[r]-() WITH c, count(r) AS degree \
             RETURN id(c), degree ORDER BY c.last_seen_epoch DESC LIMIT {}",
            limit.max(0)
        );
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher${}$cypher$) AS (concept_id agtype, degree agtype)",
            super::base::GRAPH_NAME,
            cypher
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        use sqlx::Row;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id_raw: String = row.try_get(0).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            let degree_raw: String = row.try_get(1).map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            let Ok(uuid) = id_raw.trim_matches('"').parse::<Uuid>() else { continue };
            let Ok(concept_id) = ConceptId::from_uuid(uuid) else { continue };
            let degree = degree_raw.trim_end_matches("::numeric").parse::<i64>().unwrap_or(0);
            out.push((concept_id, degree));
        }
        Ok(out)
    }

    /// §4.5 batch API: one query for every vocabulary type's embedding, used
    /// by `grounding_batch` to avoid a DB round-trip per concept.
    pub async fn fetch_vocab_embeddings(
        &self,
        names: &[VocabName],
    ) -> Result<std::collections::HashMap<String, Vec<f32>>, StoreError> {
        if names.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let name_strs: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        let rows = sqlx::query_as::<_, (String, Option<JsonValue>)>(
            "SELECT relationship_type, embedding FROM kg_api.relationship_vocabulary WHERE relationship_type = ANY($1)",
        )
        .bind(&name_strs as &[&str])
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(name, embedding)| decode_embedding(&embedding).map(|e| (name, e)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_embedding_returns_none_for_missing_value() {
        assert!(decode_embedding(&None).is_none());
    }

    #[test]
    fn decode_embedding_parses_json_array() {
        let value = serde_json::json!([0.1, 0.2, 0.3]);
        assert_eq!(decode_embedding(&Some(value)), Some(vec![0.1, 0.2, 0.3]));
    }
}
