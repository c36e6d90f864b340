//! Construction-time configuration records.
//!
//! No process-wide mutable singletons: binaries build these once and pass
//! them down. Environment overrides come from `DOCENT_*` variables, with a
//! `.env` file honoured when present.

use crate::error::DocentError;

/// Endpoints for the three model seams.
#[derive(Clone, Debug)]
pub struct ModelEndpoints {
    /// Embedding server, e.g. `http://127.0.0.1:8081/embed`.
    pub embed_url: String,
    /// Cross-encoder rerank server, e.g. `http://127.0.0.1:8082/rerank`.
    pub rerank_url: String,
    /// Text generation endpoint (Gemini-style `generateContent` URL).
    pub generate_url: String,
    /// API key appended to generation calls when set.
    pub api_key: Option<String>,
    /// Embedding model name forwarded to the embedding server.
    pub embedding_model: Option<String>,
}

impl ModelEndpoints {
    /// Reads endpoints from the environment.
    ///
    /// A missing embedding endpoint is a configuration blocker: the engine
    /// cannot open a collection without a stable embedding function.
    pub fn from_env() -> Result<Self, DocentError> {
        dotenvy::dotenv().ok();

        let embed_url = std::env::var("DOCENT_EMBED_URL")
            .map_err(|_| DocentError::Fatal("DOCENT_EMBED_URL is not set".into()))?;
        let rerank_url = std::env::var("DOCENT_RERANK_URL")
            .map_err(|_| DocentError::Fatal("DOCENT_RERANK_URL is not set".into()))?;
        let generate_url = std::env::var("DOCENT_GENERATE_URL")
            .map_err(|_| DocentError::Fatal("DOCENT_GENERATE_URL is not set".into()))?;

        Ok(Self {
            embed_url,
            rerank_url,
            generate_url,
            api_key: std::env::var("DOCENT_API_KEY").ok(),
            embedding_model: std::env::var("DOCENT_EMBEDDING_MODEL").ok(),
        })
    }
}

/// Shared-secret configuration for inter-service calls.
///
/// Enforcement is disabled when the secret is unset or still a placeholder,
/// matching the deployment convention of the surrounding services.
#[derive(Clone, Debug, Default)]
pub struct ServiceSecret {
    secret: Option<String>,
}

impl ServiceSecret {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            secret: std::env::var("SERVICE_SECRET").ok(),
        }
    }

    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Whether requests must carry the secret.
    pub fn enforced(&self) -> bool {
        match &self.secret {
            Some(s) => {
                let s = s.trim();
                !s.is_empty() && !s.eq_ignore_ascii_case("change-me")
            }
            None => false,
        }
    }

    /// Constant-time comparison against a provided header value.
    pub fn matches(&self, provided: &str) -> bool {
        let Some(expected) = &self.secret else {
            return false;
        };
        constant_time_eq(expected.trim().as_bytes(), provided.trim().as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_secret_is_not_enforced() {
        assert!(!ServiceSecret::new(None).enforced());
        assert!(!ServiceSecret::new(Some("".into())).enforced());
        assert!(!ServiceSecret::new(Some("change-me".into())).enforced());
        assert!(ServiceSecret::new(Some("s3cr3t".into())).enforced());
    }

    #[test]
    fn secret_comparison() {
        let secret = ServiceSecret::new(Some("s3cr3t".into()));
        assert!(secret.matches("s3cr3t"));
        assert!(secret.matches("  s3cr3t "));
        assert!(!secret.matches("other"));
        assert!(!secret.matches("s3cr3t-longer"));
    }
}
