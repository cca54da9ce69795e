// Source/Instance/DocumentMeta upserts and the global epoch counter
// (§3, §4.4 step 4). Grounded on `supabase_repository/mod.rs`'s
// `register_repository_and_enqueue_job` transaction shape (read-then-upsert
// inside one `tx`, `RETURNING` the row) and its `DO UPDATE ... COALESCE`
// merge-on-conflict idiom for `DocumentMeta`.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use uuid::Uuid;

use super::base::{GraphStore, StoreError};
use crate::types::{ConceptId, ContentType, DocumentId, InstanceId, SourceId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub source_id: Uuid,
    pub document: String,
    pub chunk_index: i32,
    pub full_text: String,
    pub content_type: String,
    pub embedding: Option<JsonValue>,
    pub visual_embedding: Option<JsonValue>,
    pub storage_key: Option<String>,
    pub content_hash: String,
    pub char_offset_start: i64,
    pub char_offset_end: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentMetaRow {
    pub document_id: String,
    pub ontology: String,
    pub filename: Option<String>,
    pub source_type: Option<String>,
    pub hostname: Option<String>,
    pub ingested_at: DateTime<Utc>,
    pub ingested_by: Option<String>,
    pub job_id: Option<Uuid>,
    pub source_count: i64,
}

fn content_type_str(ct: ContentType) -> &'static str {
    match ct {
        ContentType::Document => "document",
        ContentType::Image => "image",
        ContentType::Synthetic => "synthetic",
    }
}

pub struct NewSource<'a> {
    pub ontology: &'a str,
    pub chunk_index: i32,
    pub full_text: &'a str,
    pub content_type: ContentType,
    pub content_hash: &'a str,
    pub char_offset_start: i64,
    pub char_offset_end: i64,
}

impl GraphStore {
    /// §4.4 step 1: dedupe by `(content_hash, ontology)`.
    pub async fn find_document_meta(
        &self,
        content_hash: &str,
        ontology: &str,
    ) -> Result<Option<DocumentMetaRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentMetaRow>(
            r#"
            SELECT document_id, ontology, filename, source_type, hostname,
                   ingested_at, ingested_by, job_id, source_count
            FROM kg_api.document_meta
            WHERE document_id = $1 AND ontology = $2
            "#,
        )
        .bind(content_hash)
        .bind(ontology)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_source(&self, new_source: NewSource<'_>) -> Result<SourceRow, StoreError> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            INSERT INTO kg_api.source
                (source_id, document, chunk_index, full_text, content_type, content_hash, char_offset_start, char_offset_end)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING source_id, document, chunk_index, full_text, content_type,
                      embedding, visual_embedding, storage_key, content_hash, char_offset_start, char_offset_end
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_source.ontology)
        .bind(new_source.chunk_index)
        .bind(new_source.full_text)
        .bind(content_type_str(new_source.content_type))
        .bind(new_source.content_hash)
        .bind(new_source.char_offset_start)
        .bind(new_source.char_offset_end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_source_embedding(&self, id: SourceId, embedding: &[f32]) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.source SET embedding = $1 WHERE source_id = $2")
            .bind(Json(embedding))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_source_visual_embedding(
        &self,
        id: SourceId,
        embedding: &[f32],
        storage_key: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE kg_api.source SET visual_embedding = $1, storage_key = $2 WHERE source_id = $3")
            .bind(Json(embedding))
            .bind(storage_key)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deduplicated on `(quote, source_id)` (§3 invariant).
    pub async fn get_or_create_instance(
        &self,
        concept_id: ConceptId,
        source_id: SourceId,
        quote: &str,
    ) -> Result<InstanceId, StoreError> {
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT instance_id FROM kg_api.instance WHERE quote = $1 AND source_id = $2",
        )
        .bind(quote)
        .bind(source_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = existing {
            return InstanceId::from_uuid(id).map_err(|e| StoreError::MalformedRow(e.to_string()));
        }

        let new_id = Uuid::new_v4();
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO kg_api.instance (instance_id, concept_id, source_id, quote)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (quote, source_id) DO NOTHING
            RETURNING instance_id
            "#,
        )
        .bind(new_id)
        .bind(concept_id.as_uuid())
        .bind(source_id.as_uuid())
        .bind(quote)
        .fetch_optional(&self.pool)
        .await?;

        let resolved = match inserted {
            Some(id) => id,
            None => sqlx::query_scalar(
                "SELECT instance_id FROM kg_api.instance WHERE quote = $1 AND source_id = $2",
            )
            .bind(quote)
            .bind(source_id.as_uuid())
            .fetch_one(&self.pool)
            .await?,
        };
        InstanceId::from_uuid(resolved).map_err(|e| StoreError::MalformedRow(e.to_string()))
    }

    /// §4.4 step 4 / §5: `DocumentMeta` is written only on full ingestion
    /// success, linked to every created Source, and the write increments
    /// the global epoch exactly once.
    pub async fn write_document_meta_and_advance_epoch(
        &self,
        document_id: &DocumentId,
        ontology: &str,
        filename: Option<&str>,
        source_ids: &[SourceId],
        job_id: Option<Uuid>,
    ) -> Result<(DocumentMetaRow, i64), StoreError> {
        let mut tx = self.pool.begin().await?;

        let meta = sqlx::query_as::<_, DocumentMetaRow>(
            r#"
            INSERT INTO kg_api.document_meta
                (document_id, ontology, filename, ingested_at, job_id, source_count)
            VALUES ($1, $2, $3, NOW(), $4, $5)
            ON CONFLICT (document_id, ontology) DO UPDATE
                SET filename = COALESCE(EXCLUDED.filename, kg_api.document_meta.filename),
                    job_id = COALESCE(EXCLUDED.job_id, kg_api.document_meta.job_id),
                    source_count = EXCLUDED.source_count,
                    ingested_at = NOW()
            RETURNING document_id, ontology, filename, source_type, hostname,
                      ingested_at, ingested_by, job_id, source_count
            "#,
        )
        .bind(document_id.as_str())
        .bind(ontology)
        .bind(filename)
        .bind(job_id)
        .bind(source_ids.len() as i64)
        .fetch_one(&mut *tx)
        .await?;

        let epoch: i64 = sqlx::query_scalar(
            r#"
            UPDATE public.graph_metrics
            SET counter = counter + 1, updated_at = NOW()
            WHERE metric_name = 'document_ingestion_counter'
            RETURNING counter
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((meta, epoch))
    }

    pub async fn current_epoch(&self) -> Result<i64, StoreError> {
        let epoch: i64 = sqlx::query_scalar(
            "SELECT counter FROM public.graph_metrics WHERE metric_name = 'document_ingestion_counter'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(epoch)
    }

    /// Fresh Concept node with a new content-addressed identifier
    /// (§9: "never model them as owning references; resolve on demand").
    pub async fn create_concept(
        &self,
        ontology: &str,
        label: &str,
        description: Option<&str>,
        embedding: &[f32],
        search_terms: &[String],
        epoch: i64,
        creation_method: Option<&str>,
    ) -> Result<ConceptId, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO kg_api.concept
                (concept_id, ontology, label, description, embedding, search_terms, created_at_epoch, last_seen_epoch, seen_count, creation_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, 1, $8)
            "#,
        )
        .bind(id)
        .bind(ontology)
        .bind(label)
        .bind(description)
        .bind(Json(embedding))
        .bind(serde_json::to_value(search_terms).unwrap_or(JsonValue::Array(vec![])))
        .bind(epoch)
        .bind(creation_method)
        .execute(&self.pool)
        .await?;
        ConceptId::from_uuid(id).map_err(|e| StoreError::MalformedRow(e.to_string()))
    }

    /// `Concept -[<VOCAB_TYPE>]-> Concept`, MERGE-semantics so a repeated
    /// extraction of the same fact does not duplicate the edge (§4.1
    /// race handling: "edge creation uses MERGE").
    #[allow(clippy::too_many_arguments)]
    pub async fn create_relationship_edge(
        &self,
        from: ConceptId,
        to: ConceptId,
        vocab_type: &str,
        confidence: f64,
        category: &str,
        source: &str,
        job_id: Option<Uuid>,
        document_id: Option<&str>,
    ) -> Result<(), StoreError> {
        super::base::validate_identifier(vocab_type)?;

        let cypher = format!(
            "MATCH (a), (b) WHERE id(a) = $from_id AND id(b) = $to_id \
             MERGE (a)-[r:{vocab_type}]->(b) \
             SET r.confidence = $confidence, r.category = $category, r.source = $source, \
                 r.created_at = $created_at, r.job_id = $job_id, r.document_id = $document_id"
        );
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $cypher${}$cypher$, $1) AS (r agtype)",
            super::base::GRAPH_NAME,
            cypher
        );
        let params = serde_json::json!({
            "from_id": from.as_uuid().to_string(),
            "to_id": to.as_uuid().to_string(),
            "confidence": confidence,
            "category": category,
            "source": source,
            "created_at": Utc::now().to_rfc3339(),
            "job_id": job_id.map(|j| j.to_string()),
            "document_id": document_id,
        });
        sqlx::query(&sql).bind(params).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_strings_round_trip_the_three_variants() {
        assert_eq!(content_type_str(ContentType::Document), "document");
        assert_eq!(content_type_str(ContentType::Image), "image");
        assert_eq!(content_type_str(ContentType::Synthetic), "synthetic");
    }
}
