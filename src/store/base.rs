// Connection pool, Cypher query construction, and parameter marshalling
// (§4.1). Grounded on `supabase_repository/mod.rs`'s pool-owning struct and
// `sqlx::query_as` usage, generalized from Supabase/Postgres-table access to
// AGE-style `cypher()` calls against a single graph named `knowledge_graph`.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

pub const GRAPH_NAME: &str = "knowledge_graph";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid identifier {0:?}: must match ^[A-Z][A-Z0-9_]*$")]
    InvalidIdentifier(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("row did not decode as expected agtype shape: {0}")]
    MalformedRow(String),
}

/// Relationship-type / label identifier validator (§4.1, §4.3). AGE does not
/// support parameterized labels, so any label interpolated into a Cypher
/// string must first pass this check — the sole injection defense for the
/// one place labels are string-built rather than bound.
static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap());

pub fn validate_identifier(candidate: &str) -> Result<(), StoreError> {
    if IDENTIFIER_RE.is_match(candidate) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(candidate.to_string()))
    }
}

/// A Cypher-bound value after marshalling (§4.1: "strings are quote-escaped
/// and backslash-escaped; lists/maps become JSON; numerics pass through;
/// `null` is an explicit literal").
#[derive(Debug, Clone)]
pub enum CypherValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(JsonValue),
}

impl CypherValue {
    /// Render as a literal suitable for substitution into a Cypher query
    /// string. AGE's `cypher()` SQL function takes the query as a single
    /// string constant, so parameters are inlined as literals rather than
    /// bound positionally.
    pub fn to_literal(&self) -> String {
        match self {
            CypherValue::Null => "null".to_string(),
            CypherValue::Bool(b) => b.to_string(),
            CypherValue::Int(i) => i.to_string(),
            CypherValue::Float(f) => f.to_string(),
            CypherValue::Text(s) => format!("\"{}\"", escape_text(s)),
            CypherValue::Json(v) => v.to_string(),
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Substitute `$name` placeholders in a Cypher template with their marshalled
/// literal. Placeholders are matched longest-name-first so `$foo_bar` is not
/// partially consumed by a `$foo` entry.
pub fn bind_params(template: &str, params: &HashMap<String, CypherValue>) -> String {
    let mut names: Vec<&String> = params.keys().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let mut query = template.to_string();
    for name in names {
        let placeholder = format!("${name}");
        query = query.replace(&placeholder, &params[name].to_literal());
    }
    query
}

/// Owns the single connection pool shared by every capability module
/// (§4.1: "a single struct that owns the connection pool", §9).
#[derive(Clone)]
pub struct GraphStore {
    pub(crate) pool: PgPool,
}

impl GraphStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with_pool_bounds(database_url, 1, 20).await
    }

    /// §4.1: "min 1, max ~20" as a default; `config::PoolConfig` overrides it.
    pub async fn connect_with_pool_bounds(database_url: &str, min_connections: u32, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Execute a Cypher query against `knowledge_graph` via AGE's `cypher()`
    /// SQL function, returning each result row's single `agtype` column as
    /// parsed JSON. `return_columns` names the `AS (...)` clause AGE requires
    /// to type the result set.
    pub async fn execute_cypher(
        &self,
        cypher: &str,
        params: &HashMap<String, CypherValue>,
        return_columns: &str,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let bound = bind_params(cypher, params);
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{GRAPH_NAME}', $cypher${bound}$cypher$) AS ({return_columns})"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| row_to_json(&row))
            .collect::<Result<Vec<_>, _>>()
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Result<JsonValue, StoreError> {
    use sqlx::Row;
    // agtype columns decode through sqlx as text; the caller is responsible
    // for the final `serde_json::from_str` into a typed row shape.
    let raw: String = row
        .try_get(0)
        .map_err(|e| StoreError::MalformedRow(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| StoreError::MalformedRow(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uppercase_snake_identifiers() {
        assert!(validate_identifier("SUPPORTS").is_ok());
        assert!(validate_identifier("OPTIMIZES_FOR").is_ok());
        assert!(validate_identifier("A1").is_ok());
    }

    #[test]
    fn rejects_lowercase_or_leading_digit() {
        assert!(validate_identifier("supports").is_err());
        assert!(validate_identifier("1SUPPORTS").is_err());
        assert!(validate_identifier("SUP-PORTS").is_err());
        assert!(validate_identifier("SUP'; DROP").is_err());
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        let value = CypherValue::Text("he said \"hi\"\\".to_string());
        assert_eq!(value.to_literal(), "\"he said \\\"hi\\\"\\\\\"");
    }

    #[test]
    fn bind_params_prefers_longest_match() {
        let mut params = HashMap::new();
        params.insert("label".to_string(), CypherValue::Text("Foo".into()));
        params.insert("label_extra".to_string(), CypherValue::Text("Bar".into()));
        let bound = bind_params("MATCH (n {x: $label_extra, y: $label})", &params);
        assert!(bound.contains("\"Bar\""));
        assert!(bound.contains("\"Foo\""));
    }

    #[test]
    fn null_is_an_explicit_literal() {
        assert_eq!(CypherValue::Null.to_literal(), "null");
    }
}
