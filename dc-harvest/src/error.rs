//! Crawl pipeline errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    /// Network-level failure fetching a page or sitemap.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Store failure (vector or record side).
    #[error("storage error: {0}")]
    Storage(String),

    /// Bad crawl arguments (maps to CLI exit code 2).
    #[error("invalid arguments: {0}")]
    Arguments(String),

    /// Dynamic-render fallback failure.
    #[error("render error: {0}")]
    Render(String),
}

impl From<reqwest::Error> for HarvestError {
    fn from(err: reqwest::Error) -> Self {
        HarvestError::Fetch(err.to_string())
    }
}

impl From<docent::DocentError> for HarvestError {
    fn from(err: docent::DocentError) -> Self {
        HarvestError::Storage(err.to_string())
    }
}

impl From<url::ParseError> for HarvestError {
    fn from(err: url::ParseError) -> Self {
        HarvestError::Arguments(err.to_string())
    }
}
