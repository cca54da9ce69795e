// HTTP-backed embedding provider (§4.2). Adapted from
// `kotadb-kota-db/src/embeddings.rs`'s `OpenAIEmbeddingProvider`: JSON POST,
// one request per batch, the remote service's own concurrency limits apply
// (no local queueing, unlike `LocalEmbeddingProvider`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingResult};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponseItem {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

pub struct RemoteEmbeddingProvider {
    config: EmbeddingConfig,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: EmbeddingConfig, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.config.model_name,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::RequestFailed(format!(
                "remote embedding service returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|item| EmbeddingResult {
                vector: item.embedding,
                model_name: self.config.model_name.clone(),
                dimension: self.config.dimension,
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_short_circuits_without_a_request() {
        let config = EmbeddingConfig {
            model_name: "remote-embed".into(),
            dimension: 8,
            max_batch_size: 64,
        };
        let provider = RemoteEmbeddingProvider::new(config, "http://localhost/embed".into(), None);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(provider.embed_texts(&[])).unwrap();
        assert!(result.is_empty());
    }
}
