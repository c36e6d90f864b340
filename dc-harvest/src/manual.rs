//! Manual knowledge ingestion: chunk, embed, and store raw text directly
//! into a tenant's collection without crawling.

use std::sync::Arc;

use docent::models::Embedder;
use docent::stores::VectorCollection;
use docent::tenant::TenantContext;
use serde::Serialize;
use tracing::info;

use crate::error::HarvestError;
use crate::extract::ExtractedItem;
use crate::pipeline::{ContentPipeline, PageRef};

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ManualIngestSummary {
    pub chunks_stored: u64,
    pub total_documents: u64,
}

/// Runs raw text through the same chunk → embed → store sequence as the
/// crawl pipeline, tagged `source = "manual"`.
pub async fn add_manual_knowledge(
    tenant: &TenantContext,
    collection_name: &str,
    embedder: Arc<dyn Embedder>,
    content: &str,
) -> Result<ManualIngestSummary, HarvestError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(HarvestError::Arguments("content cannot be empty".into()));
    }

    let collection = VectorCollection::open(&tenant.vector_store_path, collection_name).await?;
    let mut pipeline = ContentPipeline::new(embedder, tenant.resource_id.clone(), "manual");

    let page = PageRef {
        url: format!("manual://{}", tenant.safe_resource_id()),
        domain: "manual".into(),
        title: None,
    };
    let item = ExtractedItem {
        text: content.to_string(),
        content_type: "manual".into(),
    };
    pipeline.process_item(&collection, &page, &item).await?;
    pipeline.flush(&collection).await?;

    let chunks_stored = pipeline.stats.chunks_stored;
    let total_documents = collection.count().await?;
    collection.close_handle().await;

    info!(
        resource_id = %tenant.resource_id,
        chunks_stored,
        total_documents,
        "manual knowledge stored"
    );
    Ok(ManualIngestSummary {
        chunks_stored,
        total_documents,
    })
}
