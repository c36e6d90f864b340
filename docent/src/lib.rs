//! ```text
//! Tenant context ──► TenantRegistry ──► Engine (one per tenant)
//!                                         │
//!                      ┌──────────────────┼──────────────────┐
//!                      ▼                  ▼                  ▼
//!               VectorCollection    RecordStore        SessionStore
//!               (sqlite-vec)        (leads + url       (name gate, lead
//!                                    tracking)          steps, scratch)
//!                      │
//!                      ▼
//!        multi-pass retrieval ──► hybrid rerank ──► answer synthesis
//! ```
//!
//! The engine's chat entry point never fails toward the caller: every
//! internal error is converted into a conversational apology string at the
//! top. Tenant state is fully partitioned by resource id; the registry is
//! the only component that creates or destroys engines.

pub mod chunker;
pub mod config;
pub mod contact;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod session;
pub mod stores;
pub mod tenant;
pub mod validators;

pub use engine::Engine;
pub use error::DocentError;
pub use registry::TenantRegistry;
pub use tenant::TenantContext;
