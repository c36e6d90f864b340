//! HTTP-backed model clients.
//!
//! The embedding and rerank clients speak the text-embeddings-inference
//! wire shape; the generator speaks the Gemini `generateContent` shape.
//! All three are plain JSON posts with per-call error mapping.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Embedder, GenerationOptions, Generator, Reranker};
use crate::config::ModelEndpoints;
use crate::error::DocentError;

/// Embedding client: `POST {url} { "inputs": [...] }` -> `[[f32]]`.
#[derive(Clone, Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: Option<String>,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, url: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            model,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| DocentError::Model("embedding server returned no vectors".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DocentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            inputs: texts,
            model: self.model.as_deref(),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let vectors: Vec<Vec<f32>> = response.json().await?;
        if vectors.len() != texts.len() {
            return Err(DocentError::Model(format!(
                "embedding server returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

/// Cross-encoder client: `POST {url} { "query", "texts" }` ->
/// `[{ "index": usize, "score": f32 }]`.
#[derive(Clone, Debug)]
pub struct HttpReranker {
    client: reqwest::Client,
    url: String,
}

impl HttpReranker {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    score: f32,
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, DocentError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query, "texts": documents }))
            .send()
            .await?
            .error_for_status()?;
        let entries: Vec<RerankEntry> = response.json().await?;

        let mut scores = vec![0.0f32; documents.len()];
        for entry in entries {
            if entry.index >= scores.len() {
                return Err(DocentError::Model(format!(
                    "rerank index {} out of range for {} documents",
                    entry.index,
                    scores.len()
                )));
            }
            scores[entry.index] = entry.score;
        }
        Ok(scores)
    }
}

/// Gemini-style generation client.
#[derive(Clone, Debug)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GeminiGenerator {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, DocentError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": options.temperature,
                "topP": options.top_p,
                "topK": options.top_k,
            }
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DocentError::Synthesis(e.to_string()))?
            .error_for_status()
            .map_err(|e| DocentError::Synthesis(e.to_string()))?;

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DocentError::Synthesis(e.to_string()))?;

        let text = value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DocentError::Synthesis("generation response had no text part".into()))?;

        Ok(text.trim().to_string())
    }
}

/// Builds the three production clients from one endpoint config.
pub fn build_clients(
    endpoints: &ModelEndpoints,
) -> (HttpEmbedder, HttpReranker, GeminiGenerator) {
    let client = reqwest::Client::new();
    (
        HttpEmbedder::new(
            client.clone(),
            endpoints.embed_url.clone(),
            endpoints.embedding_model.clone(),
        ),
        HttpReranker::new(client.clone(), endpoints.rerank_url.clone()),
        GeminiGenerator::new(client, endpoints.generate_url.clone(), endpoints.api_key.clone()),
    )
}
