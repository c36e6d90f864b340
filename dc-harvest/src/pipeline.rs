//! Content pipeline: dedup, chunk, embed, and idempotent vector storage.
//!
//! Batches of 50 with three retries and exponential backoff; a batch-level
//! duplicate-id error falls back to per-item inserts. An in-memory set of
//! emitted ids short-circuits duplicates within the run without hitting
//! the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use docent::chunker::chunk_text;
use docent::models::Embedder;
use docent::stores::{ChunkDocument, ChunkMetadata, VectorCollection};
use rustc_hash::FxHashSet;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::HarvestError;
use crate::extract::ExtractedItem;

const BATCH_SIZE: usize = 50;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const MIN_ITEM_WORDS: usize = 3;

/// Source page attributes attached to every chunk extracted from it.
#[derive(Clone, Debug)]
pub struct PageRef {
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
}

/// Counters reported in the run summary.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PipelineStats {
    pub items_processed: u64,
    pub items_dropped: u64,
    pub chunks_stored: u64,
    pub duplicate_chunks_skipped: u64,
}

pub struct ContentPipeline {
    embedder: Arc<dyn Embedder>,
    resource_id: String,
    source_tag: String,
    seen_text_hashes: FxHashSet<String>,
    emitted_ids: FxHashSet<String>,
    batch: Vec<(ChunkDocument, Vec<f32>)>,
    pub stats: PipelineStats,
}

impl ContentPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        resource_id: impl Into<String>,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            resource_id: resource_id.into(),
            source_tag: source_tag.into(),
            seen_text_hashes: FxHashSet::default(),
            emitted_ids: FxHashSet::default(),
            batch: Vec::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Runs one extracted item through dedup, chunking, embedding, and
    /// batched storage.
    pub async fn process_item(
        &mut self,
        collection: &VectorCollection,
        page: &PageRef,
        item: &ExtractedItem,
    ) -> Result<(), HarvestError> {
        let text = collapse_whitespace(&item.text);
        if text.is_empty() {
            self.stats.items_dropped += 1;
            return Ok(());
        }

        // Session-wide text dedup before any model work.
        let text_hash = hex::encode(Sha256::digest(text.as_bytes()));
        if !self.seen_text_hashes.insert(text_hash) {
            self.stats.items_dropped += 1;
            return Ok(());
        }
        if text.split_whitespace().count() < MIN_ITEM_WORDS {
            self.stats.items_dropped += 1;
            return Ok(());
        }

        let chunks = chunk_text(&text);
        if chunks.is_empty() {
            self.stats.items_dropped += 1;
            return Ok(());
        }

        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .await
            .map_err(|e| HarvestError::Storage(e.to_string()))?;

        let micro_ts = Utc::now().timestamp_micros().to_string();
        for (index, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let id = chunk_id(&page.url, &chunk, &micro_ts, index);
            if !self.emitted_ids.insert(id.clone()) {
                self.stats.duplicate_chunks_skipped += 1;
                continue;
            }
            let word_count = chunk.split_whitespace().count() as i64;
            let document = ChunkDocument {
                id,
                metadata: ChunkMetadata {
                    url: Some(page.url.clone()),
                    page_title: page.title.clone(),
                    content_type: Some(item.content_type.clone()),
                    domain: Some(page.domain.clone()),
                    source: Some(self.source_tag.clone()),
                    chunk_index: Some(index as i64),
                    chunk_length: Some(chunk.len() as i64),
                    chunk_word_count: Some(word_count),
                    extraction_timestamp: Some(micro_ts.clone()),
                    resource_id: Some(self.resource_id.clone()),
                },
                text: chunk,
            };
            self.batch.push((document, embedding));
            if self.batch.len() >= BATCH_SIZE {
                self.store_batch(collection).await?;
            }
        }

        self.stats.items_processed += 1;
        Ok(())
    }

    /// Stores any buffered chunks; call once at end of run.
    pub async fn flush(&mut self, collection: &VectorCollection) -> Result<(), HarvestError> {
        if !self.batch.is_empty() {
            self.store_batch(collection).await?;
        }
        Ok(())
    }

    async fn store_batch(&mut self, collection: &VectorCollection) -> Result<(), HarvestError> {
        let batch = std::mem::take(&mut self.batch);
        let batch_len = batch.len();

        let mut attempt = 0u32;
        loop {
            match collection.insert_batch(batch.clone()).await {
                Ok(inserted) => {
                    self.stats.chunks_stored += inserted as u64;
                    debug!(inserted, total = self.stats.chunks_stored, "batch stored");
                    return Ok(());
                }
                Err(e) if is_duplicate_id_error(&e) => {
                    // Per-item fallback: skip the offending ids, keep the rest.
                    let inserted = collection
                        .insert_ignoring_duplicates(batch)
                        .await
                        .map_err(|e| HarvestError::Storage(e.to_string()))?;
                    self.stats.chunks_stored += inserted as u64;
                    self.stats.duplicate_chunks_skipped += (batch_len - inserted) as u64;
                    warn!(
                        inserted,
                        skipped = batch_len - inserted,
                        "duplicate ids in batch; stored individually"
                    );
                    return Ok(());
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let wait = RETRY_DELAY * 2u32.pow(attempt);
                    warn!(error = %e, attempt, wait_secs = wait.as_secs(), "batch insert failed; retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    // The batch is dropped after exhausted retries; the
                    // crawl carries on.
                    warn!(error = %e, dropped = batch_len, "batch insert failed after retries; dropping");
                    self.stats.items_dropped += batch_len as u64;
                    return Ok(());
                }
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic 128-bit hex id:
/// `SHA-256(url ‖ chunk_hash ‖ microsecond_timestamp ‖ chunk_index)[..16]`.
fn chunk_id(url: &str, chunk: &str, micro_ts: &str, index: usize) -> String {
    let chunk_hash = hex::encode(Sha256::digest(chunk.as_bytes()));
    let digest = Sha256::digest(format!("{url}_{chunk_hash}_{micro_ts}_{index}").as_bytes());
    hex::encode(&digest[..16])
}

fn is_duplicate_id_error(error: &docent::DocentError) -> bool {
    error.to_string().contains("UNIQUE constraint failed")
}
