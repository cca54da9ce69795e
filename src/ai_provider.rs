// Capability trait for chunk-to-concepts extraction and the related LLM
// surfaces (§9 design note, §6 wire envelope). Grounded on
// `original_source/api/app/lib/ai_providers.py`'s `AIProvider` base class
// (`extract_concepts`, `describe_image`, `validate_api_key`) translated from
// an ABC-subclass hierarchy into the closed sum type §9 calls for: one
// trait, a small fixed set of implementors, no inheritance chain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Confidence;

#[derive(Debug, Error)]
pub enum AiProviderError {
    #[error("provider request failed: {0}")]
    RequestFailed(String),
    #[error("provider returned malformed extraction JSON: {0}")]
    MalformedResponse(String),
    #[error("provider is not configured correctly: {0}")]
    Misconfigured(String),
}

/// A concept already known to the ingestion pipeline, given to the LLM as
/// context so it can match rather than duplicate (§4.4 step 3).
#[derive(Debug, Clone, Serialize)]
pub struct KnownConcept {
    pub concept_id: String,
    pub label: String,
}

/// Everything the provider needs to extract structured concepts from one
/// chunk (§4.4 step 3: "system prompt enumerating relationship categories,
/// previously seen concepts, and the chunk text").
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub chunk_text: String,
    pub known_concepts: Vec<KnownConcept>,
    pub ontology: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedConcept {
    pub concept_id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub search_terms: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedInstance {
    pub concept_id: String,
    pub quote: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRelationship {
    pub from_concept_id: String,
    pub to_concept_id: String,
    pub relationship_type: String,
    pub confidence: f64,
    pub category: Option<String>,
}

/// The strict wire envelope (§6): `{ concepts, instances, relationships }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub concepts: Vec<ExtractedConcept>,
    #[serde(default)]
    pub instances: Vec<ExtractedInstance>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
}

impl ExtractionResult {
    /// Confidence values arrive unvalidated from the LLM; the ingestion
    /// pipeline must reject out-of-range values rather than clamp them
    /// (§7: validation errors reject synchronously, no silent correction).
    pub fn validate_confidences(&self) -> Result<(), AiProviderError> {
        for rel in &self.relationships {
            if Confidence::new(rel.confidence).is_err() {
                return Err(AiProviderError::MalformedResponse(format!(
                    "relationship {} -> {} has out-of-range confidence {}",
                    rel.from_concept_id, rel.to_concept_id, rel.confidence
                )));
            }
        }
        Ok(())
    }
}

/// Strip Markdown code fencing (```json ... ```` or ``` ... ```) that LLMs
/// routinely wrap strict-JSON responses in despite instructions not to
/// (§6: "Markdown fencing must be tolerated and stripped").
pub fn strip_markdown_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_open = after_open
        .strip_prefix("json")
        .unwrap_or(after_open)
        .trim_start_matches('\n');
    after_open.strip_suffix("```").unwrap_or(after_open).trim()
}

pub fn parse_extraction_response(raw: &str) -> Result<ExtractionResult, AiProviderError> {
    let stripped = strip_markdown_fence(raw);
    let result: ExtractionResult = serde_json::from_str(stripped)
        .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;
    result.validate_confidences()?;
    Ok(result)
}

/// The closed capability set every AI provider variant implements (§9):
/// concept extraction, raw embedding, prose translation/normalization, and
/// image description for the image-chunk ingestion path (§4.4).
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn extract_concepts(&self, request: ExtractionRequest) -> Result<ExtractionResult, AiProviderError>;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiProviderError>;
    async fn translate_prose(&self, text: &str, target_language: &str) -> Result<String, AiProviderError>;
    async fn describe_image(&self, image_bytes: &[u8]) -> Result<String, AiProviderError>;
    fn validate(&self) -> Result<(), AiProviderError>;
}

/// HTTP-backed provider speaking to a hosted chat-completion endpoint.
/// Adapted from `ai_providers.py`'s `OpenAIProvider`/`AnthropicProvider`
/// shape, generalized to whichever remote chat API is configured since the
/// specific vendor is out of scope (§1 Non-goals: prompt engineering).
pub struct RemoteChatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl RemoteChatProvider {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    async fn chat_completion(&self, system_prompt: &str, user_content: &str) -> Result<String, AiProviderError> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }
        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Request {
                model: &self.model,
                messages: vec![
                    Message {
                        role: "system",
                        content: system_prompt,
                    },
                    Message {
                        role: "user",
                        content: user_content,
                    },
                ],
            })
            .send()
            .await
            .map_err(|e| AiProviderError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AiProviderError::RequestFailed(format!(
                "chat completion returned {}",
                response.status()
            )));
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| AiProviderError::RequestFailed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AiProviderError::MalformedResponse("no choices in response".into()))
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You are a concept extraction engine. Return strict JSON matching \
    {concepts, instances, relationships} with no prose outside the JSON object.";

#[async_trait]
impl AiProvider for RemoteChatProvider {
    async fn extract_concepts(&self, request: ExtractionRequest) -> Result<ExtractionResult, AiProviderError> {
        let user_content = serde_json::to_string(&request)
            .map_err(|e| AiProviderError::MalformedResponse(e.to_string()))?;
        let raw = self.chat_completion(EXTRACTION_SYSTEM_PROMPT, &user_content).await?;
        parse_extraction_response(&raw)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
        Err(AiProviderError::Misconfigured(format!(
            "RemoteChatProvider does not serve embeddings directly; use EmbeddingService (requested for {} chars)",
            text.len()
        )))
    }

    async fn translate_prose(&self, text: &str, target_language: &str) -> Result<String, AiProviderError> {
        let prompt = format!("Translate the following prose into {target_language}, preserving meaning exactly:");
        self.chat_completion(&prompt, text).await
    }

    async fn describe_image(&self, image_bytes: &[u8]) -> Result<String, AiProviderError> {
        let placeholder = format!("[image, {} bytes]", image_bytes.len());
        self.chat_completion(
            "Describe the attached image in plain prose suitable for concept extraction.",
            &placeholder,
        )
        .await
    }

    fn validate(&self) -> Result<(), AiProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(AiProviderError::Misconfigured("missing API key".into()));
        }
        Ok(())
    }
}

/// In-process model provider for self-hosted extraction/translation/vision,
/// adapted from `ai_providers.py`'s `LocalEmbeddingProvider`/`OllamaProvider`
/// pattern but speaking to a local HTTP endpoint (e.g. an Ollama-style
/// server) rather than an in-process tensor runtime, which is explicitly out
/// of scope (§1 Non-goals: the specific embedding/LLM model).
pub struct LocalModelProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl LocalModelProvider {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl AiProvider for LocalModelProvider {
    async fn extract_concepts(&self, request: ExtractionRequest) -> Result<ExtractionResult, AiProviderError> {
        #[derive(Serialize)]
        struct LocalRequest<'a> {
            model: &'a str,
            system: &'a str,
            prompt: &'a ExtractionRequest,
        }
        let response = self
            .client
            .post(&self.endpoint)
            .json(&LocalRequest {
                model: &self.model,
                system: EXTRACTION_SYSTEM_PROMPT,
                prompt: &request,
            })
            .send()
            .await
            .map_err(|e| AiProviderError::RequestFailed(e.to_string()))?;

        let raw = response
            .text()
            .await
            .map_err(|e| AiProviderError::RequestFailed(e.to_string()))?;
        parse_extraction_response(&raw)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
        Err(AiProviderError::Misconfigured(format!(
            "LocalModelProvider does not serve embeddings directly; use EmbeddingService (requested for {} chars)",
            text.len()
        )))
    }

    async fn translate_prose(&self, text: &str, target_language: &str) -> Result<String, AiProviderError> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            target_language: &'a str,
            text: &'a str,
        }
        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .json(&Req {
                model: &self.model,
                target_language,
                text,
            })
            .send()
            .await
            .map_err(|e| AiProviderError::RequestFailed(e.to_string()))?;
        response.text().await.map_err(|e| AiProviderError::RequestFailed(e.to_string()))
    }

    async fn describe_image(&self, image_bytes: &[u8]) -> Result<String, AiProviderError> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            image_base64: String,
            #[serde(skip)]
            _marker: &'a (),
        }
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, image_bytes);
        let response = self
            .client
            .post(format!("{}/vision", self.endpoint))
            .json(&Req {
                model: &self.model,
                image_base64: encoded,
                _marker: &(),
            })
            .send()
            .await
            .map_err(|e| AiProviderError::RequestFailed(e.to_string()))?;
        response.text().await.map_err(|e| AiProviderError::RequestFailed(e.to_string()))
    }

    fn validate(&self) -> Result<(), AiProviderError> {
        if self.endpoint.trim().is_empty() {
            return Err(AiProviderError::Misconfigured("missing local model endpoint".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Deterministic stand-in for tests, named out of scope as a runtime
    /// component (§1) but required by the contract so extraction-dependent
    /// code can be exercised without a live LLM.
    pub struct MockProvider {
        pub calls: AtomicUsize,
        pub fixed_response: ExtractionResult,
    }

    impl MockProvider {
        pub fn new(fixed_response: ExtractionResult) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fixed_response,
            }
        }
    }

    #[async_trait]
    impl AiProvider for MockProvider {
        async fn extract_concepts(&self, _request: ExtractionRequest) -> Result<ExtractionResult, AiProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.fixed_response.clone())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
            let mut v = vec![0.0f32; 8];
            let h = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
            v[(h as usize) % 8] = 1.0;
            Ok(v)
        }

        async fn translate_prose(&self, text: &str, _target_language: &str) -> Result<String, AiProviderError> {
            Ok(text.to_string())
        }

        async fn describe_image(&self, image_bytes: &[u8]) -> Result<String, AiProviderError> {
            Ok(format!("mock description of {} bytes", image_bytes.len()))
        }

        fn validate(&self) -> Result<(), AiProviderError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_fence() {
        let raw = "```\n{\"concepts\":[]}\n```";
        assert_eq!(strip_markdown_fence(raw), "{\"concepts\":[]}");
    }

    #[test]
    fn strips_json_tagged_fence() {
        let raw = "```json\n{\"concepts\":[]}\n```";
        assert_eq!(strip_markdown_fence(raw), "{\"concepts\":[]}");
    }

    #[test]
    fn passes_through_unfenced_json() {
        let raw = "{\"concepts\":[]}";
        assert_eq!(strip_markdown_fence(raw), raw);
    }

    #[test]
    fn parses_fenced_extraction_response() {
        let raw = r#"```json
        {
          "concepts": [{"label": "Recursive Depth", "search_terms": ["recursion"]}],
          "instances": [{"concept_id": "c1", "quote": "depth matters"}],
          "relationships": [{"from_concept_id": "c1", "to_concept_id": "c2", "relationship_type": "SUPPORTS", "confidence": 0.9}]
        }
        ```"#;
        let parsed = parse_extraction_response(raw).unwrap();
        assert_eq!(parsed.concepts.len(), 1);
        assert_eq!(parsed.relationships[0].relationship_type, "SUPPORTS");
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let raw = r#"{"concepts":[],"instances":[],"relationships":[{"from_concept_id":"a","to_concept_id":"b","relationship_type":"SUPPORTS","confidence":1.5}]}"#;
        assert!(parse_extraction_response(raw).is_err());
    }

    #[tokio::test]
    async fn mock_provider_returns_fixed_response() {
        let fixed = ExtractionResult {
            concepts: Vec::new(),
            instances: Vec::new(),
            relationships: Vec::new(),
        };
        let provider = mock::MockProvider::new(fixed);
        let request = ExtractionRequest {
            chunk_text: "text".into(),
            known_concepts: Vec::new(),
            ontology: "Test".into(),
        };
        let result = provider.extract_concepts(request).await.unwrap();
        assert!(result.concepts.is_empty());
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
