//! Model seams: embedding, cross-encoder reranking, and text generation.
//!
//! The engine only ever sees these traits. Production wiring uses the HTTP
//! implementations in [`http`]; tests substitute deterministic fakes. One
//! `Embedder` instance is shared by a tenant's query and write paths so the
//! embedding function identity stays stable across both.

pub mod http;

use async_trait::async_trait;

use crate::error::DocentError;

/// Sentence embedding function.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError>;

    /// Batch variant; the default loops over [`Embedder::embed`].
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DocentError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Cross-encoder scoring of (query, document) pairs.
///
/// Returns one score per document, in input order.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, DocentError>;
}

/// Sampling options for answer synthesis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            top_k: 50,
        }
    }
}

/// Black-box text generator (the LLM).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, DocentError>;
}
