//! Error taxonomy shared across the retrieval engine and its stores.

use thiserror::Error;

/// Errors surfaced by the core library.
///
/// The kinds mirror how callers must react: `TenantContext` is a caller
/// mistake, `Unavailable` means a dependency was down at startup,
/// `Backend` covers transient store failures that are retried or dropped
/// locally, `Model` covers the embedding/rerank seams, `Synthesis` covers
/// the text generator, and `Fatal` aborts process start.
#[derive(Debug, Error)]
pub enum DocentError {
    /// Missing or empty resource id, vector store path, or record store URI.
    #[error("invalid tenant context: {0}")]
    TenantContext(String),

    /// A required backing service is not reachable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Transient vector or record store failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Embedding or cross-encoder backend failure.
    #[error("model backend error: {0}")]
    Model(String),

    /// LLM call failure during answer synthesis.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Configuration blocker that must abort process start.
    #[error("configuration error: {0}")]
    Fatal(String),
}

impl From<sqlx::Error> for DocentError {
    fn from(err: sqlx::Error) -> Self {
        DocentError::Backend(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for DocentError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        DocentError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for DocentError {
    fn from(err: reqwest::Error) -> Self {
        DocentError::Model(err.to_string())
    }
}
