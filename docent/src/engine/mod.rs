//! The per-tenant retrieval engine.
//!
//! One engine per tenant, owned by the registry. Holds the vector
//! collection handle, the record store connection, one embedder, one
//! cross-encoder, and the per-session conversation state.

mod chat;
mod location;
mod rerank;
mod retrieval;
mod synthesis;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::contact::{ContactExtractor, ContactInfo};
use crate::error::DocentError;
use crate::models::{Embedder, Generator, Reranker};
use crate::session::SessionStore;
use crate::stores::{LeadRecord, RecordStore, VectorCollection};
use crate::tenant::TenantContext;

/// Default passage count returned by the hybrid reranker.
pub const DEFAULT_MAX_PASSAGES: usize = 10;

pub struct Engine {
    tenant: TenantContext,
    vectors: RwLock<VectorCollection>,
    records: RecordStore,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn Generator>,
    contact: ContactExtractor,
    sessions: SessionStore,
    max_passages: usize,
}

impl Engine {
    /// Opens a tenant's engine: vector collection (created with cosine
    /// metric if absent) and record store (legacy index cleanup, unique
    /// session index).
    pub async fn open(
        tenant: TenantContext,
        collection_name: &str,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, DocentError> {
        info!(
            resource_id = %tenant.resource_id,
            vector_store = %tenant.vector_store_path.display(),
            collection = collection_name,
            "opening tenant engine"
        );

        let vectors = VectorCollection::open(&tenant.vector_store_path, collection_name).await?;
        let doc_count = vectors.count().await?;
        if doc_count == 0 {
            warn!(resource_id = %tenant.resource_id, "vector collection is empty; nothing scraped yet");
        } else {
            info!(resource_id = %tenant.resource_id, documents = doc_count, "vector collection loaded");
        }

        let records = RecordStore::connect(&tenant).await?;

        Ok(Self {
            tenant,
            vectors: RwLock::new(vectors),
            records,
            embedder,
            reranker,
            generator,
            contact: ContactExtractor::new(),
            sessions: SessionStore::new(),
            max_passages: DEFAULT_MAX_PASSAGES,
        })
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Current document count in the vector collection.
    pub async fn document_count(&self) -> Result<u64, DocentError> {
        self.vectors.read().await.count().await
    }

    /// Destroys the collection handle and reopens it from disk.
    ///
    /// The embedder and cross-encoder are preserved; only the vector handle
    /// cycles. Returns the fresh document count.
    pub async fn reload_vectors(&self) -> Result<u64, DocentError> {
        let mut vectors = self.vectors.write().await;
        vectors.reload().await
    }

    /// Source snippets stored for the session's last answered question.
    pub fn recent_sources(&self, session_id: &str, limit: usize) -> Vec<String> {
        self.sessions.recent_sources(session_id, limit)
    }

    pub async fn all_leads(&self) -> Result<Vec<LeadRecord>, DocentError> {
        self.records.all_leads().await
    }

    pub async fn leads_count(&self) -> Result<u64, DocentError> {
        self.records.leads_count().await
    }

    /// Contact-info report for the tenant's corpus: focused retrieval over
    /// contact-specific terms, extraction, and formatting.
    pub async fn contact_report(&self, question: &str) -> Result<(ContactInfo, String), DocentError> {
        let docs = self.search_contact_content(question).await;
        let mut info = ContactInfo::default();
        for doc in &docs {
            info.merge(self.contact.extract(doc));
        }
        let formatted = self.contact.format_response(&info, question);
        Ok((info, formatted))
    }

    /// Embeds `text` and queries the collection; failures degrade to an
    /// empty result so one bad sub-query never sinks a retrieval pass.
    pub(crate) async fn search_text(&self, text: &str, limit: usize) -> Vec<crate::stores::ScoredChunk> {
        let embedding = match self.embedder.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, "embedding failed for sub-query");
                return Vec::new();
            }
        };
        match self.vectors.read().await.search(&embedding, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "vector search failed for sub-query");
                Vec::new()
            }
        }
    }

    /// Focused contact search used by the contact report and by contact
    /// queries that found nothing in the general pass.
    pub(crate) async fn search_contact_content(&self, question: &str) -> Vec<String> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut docs = Vec::new();
        for term in self.contact.focused_search_terms(question) {
            for hit in self.search_text(term, 40).await {
                let text = hit.document.text;
                if !text.trim().is_empty() && seen.insert(text.clone()) {
                    docs.push(text);
                }
                if docs.len() >= 25 {
                    return docs;
                }
            }
        }
        docs
    }

    /// Closes the record-store connection and the vector handle. Only the
    /// registry calls this.
    pub(crate) async fn close(&self) {
        self.records.close().await;
        self.vectors.read().await.close_handle().await;
    }
}
