//! Deterministic model fakes and tenant fixtures shared by the
//! integration tests. No test in this crate touches a network.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use docent::error::DocentError;
use docent::models::{Embedder, GenerationOptions, Generator, Reranker};
use docent::registry::TenantRegistry;
use docent::stores::{ChunkDocument, ChunkMetadata, VectorCollection};
use docent::tenant::TenantContext;

pub const DIMS: usize = 16;

/// Token-bucket embedding: deterministic, cheap, and similar texts land on
/// similar vectors.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        let mut buckets = vec![0.0f32; DIMS];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            buckets[(hasher.finish() % DIMS as u64) as usize] += 1.0;
        }
        let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut buckets {
                *v /= norm;
            }
        } else {
            buckets[0] = 1.0;
        }
        Ok(buckets)
    }
}

/// Scores by word overlap between query and document.
pub struct OverlapReranker;

#[async_trait]
impl Reranker for OverlapReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, DocentError> {
        let query_words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Ok(documents
            .iter()
            .map(|doc| {
                let doc_lower = doc.to_lowercase();
                query_words.iter().filter(|w| doc_lower.contains(*w)).count() as f32
            })
            .collect())
    }
}

/// Echoes the CONTEXT section of the prompt so tests can observe exactly
/// which passages reached the generator.
pub struct ContextEchoGenerator;

#[async_trait]
impl Generator for ContextEchoGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _options: GenerationOptions,
    ) -> Result<String, DocentError> {
        let context = prompt
            .split_once("CONTEXT:\n")
            .and_then(|(_, rest)| rest.split_once("\n\nINSTRUCTIONS:"))
            .map(|(context, _)| context.trim())
            .unwrap_or("no context");
        Ok(format!("Answer based on: {context}"))
    }
}

/// One tenant's on-disk fixture plus its context.
pub struct TenantFixture {
    pub ctx: TenantContext,
    _vector_dir: TempDir,
    _record_dir: TempDir,
}

impl TenantFixture {
    pub fn new(resource_id: &str) -> Self {
        let vector_dir = TempDir::new().unwrap();
        let record_dir = TempDir::new().unwrap();
        let uri = format!(
            "sqlite://{}?mode=rwc",
            record_dir.path().join("records.db").display()
        );
        let ctx = TenantContext::new(
            resource_id,
            vector_dir.path().to_string_lossy(),
            uri,
        )
        .unwrap();
        Self {
            ctx,
            _vector_dir: vector_dir,
            _record_dir: record_dir,
        }
    }

    /// Seeds the tenant's collection through a separate writer handle,
    /// embedding with the same function the engine queries with.
    pub async fn seed(&self, docs: &[(&str, &str, Option<&str>)]) {
        let collection = VectorCollection::open(&self.ctx.vector_store_path, "scraped_content")
            .await
            .unwrap();
        let embedder = HashEmbedder;
        let mut batch = Vec::new();
        for (i, (id, text, url)) in docs.iter().enumerate() {
            let embedding = embedder.embed(text).await.unwrap();
            batch.push((
                ChunkDocument {
                    id: id.to_string(),
                    text: text.to_string(),
                    metadata: ChunkMetadata {
                        url: url.map(str::to_string),
                        page_title: url.map(|u| title_for(u)),
                        chunk_index: Some(i as i64),
                        resource_id: Some(self.ctx.resource_id.clone()),
                        ..Default::default()
                    },
                },
                embedding,
            ));
        }
        collection.insert_batch(batch).await.unwrap();
        collection.close_handle().await;
    }
}

fn title_for(url: &str) -> String {
    url.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("Home")
        .replace('-', " ")
}

pub fn registry() -> TenantRegistry {
    TenantRegistry::new(
        "scraped_content",
        Arc::new(HashEmbedder),
        Arc::new(OverlapReranker),
        Arc::new(ContextEchoGenerator),
    )
}
