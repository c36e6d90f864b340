//! Per-tenant storage: the vector collection and the record store.
//!
//! Each tenant owns one vector collection (SQLite + sqlite-vec, cosine) and
//! one record store (SQLite via sqlx) holding leads and URL-tracking rows.
//! The two never share a connection; writers target disjoint namespaces.

pub mod records;
pub mod vector;

pub use records::{LeadRecord, LeadStatus, RecordStore, UrlRecord};
pub use vector::{ChunkDocument, ChunkMetadata, ScoredChunk, VectorCollection};
