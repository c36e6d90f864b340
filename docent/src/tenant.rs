//! Tenant addressing and isolation keys.

use std::path::PathBuf;

use crate::error::DocentError;

/// The triple that uniquely addresses a tenant.
///
/// All three fields are required to resolve or create an engine; the
/// registry caches engines on `(vector_store_path, record_store_uri)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantContext {
    pub resource_id: String,
    pub vector_store_path: PathBuf,
    pub record_store_uri: String,
}

/// Registry cache key: `(vector_store_path, record_store_uri)`.
pub type CacheKey = (String, String);

impl TenantContext {
    /// Validates and normalizes a tenant context.
    ///
    /// Rejects empty or whitespace-only components; trims the rest.
    pub fn new(
        resource_id: impl AsRef<str>,
        vector_store_path: impl AsRef<str>,
        record_store_uri: impl AsRef<str>,
    ) -> Result<Self, DocentError> {
        let resource_id = resource_id.as_ref().trim();
        let vector_store_path = vector_store_path.as_ref().trim();
        let record_store_uri = record_store_uri.as_ref().trim();

        if resource_id.is_empty() {
            return Err(DocentError::TenantContext(
                "resource_id is required and cannot be empty".into(),
            ));
        }
        if vector_store_path.is_empty() {
            return Err(DocentError::TenantContext(
                "vector_store_path is required for tenant isolation and cannot be empty".into(),
            ));
        }
        if record_store_uri.is_empty() {
            return Err(DocentError::TenantContext(
                "record_store_uri is required for tenant isolation and cannot be empty".into(),
            ));
        }

        Ok(Self {
            resource_id: resource_id.to_string(),
            vector_store_path: PathBuf::from(vector_store_path),
            record_store_uri: record_store_uri.to_string(),
        })
    }

    pub fn cache_key(&self) -> CacheKey {
        (
            self.vector_store_path.to_string_lossy().into_owned(),
            self.record_store_uri.clone(),
        )
    }

    /// Resource id reduced to `[a-zA-Z0-9._-]` and capped at 80 chars, used
    /// wherever the id becomes part of a table name.
    pub fn safe_resource_id(&self) -> String {
        let safe: String = self
            .resource_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .take(80)
            .collect();
        if safe.is_empty() { "tenant".into() } else { safe }
    }

    /// Name of this tenant's URL-tracking table.
    pub fn url_tracking_table(&self) -> String {
        format!("url_tracking_{}", self.safe_resource_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_components() {
        assert!(TenantContext::new("", "/data/t1", "sqlite://t1.db").is_err());
        assert!(TenantContext::new("t1", "  ", "sqlite://t1.db").is_err());
        assert!(TenantContext::new("t1", "/data/t1", "").is_err());
    }

    #[test]
    fn trims_components() {
        let ctx = TenantContext::new(" t1 ", " /data/t1 ", " sqlite://t1.db ").unwrap();
        assert_eq!(ctx.resource_id, "t1");
        assert_eq!(ctx.record_store_uri, "sqlite://t1.db");
    }

    #[test]
    fn safe_resource_id_replaces_and_caps() {
        let ctx = TenantContext::new("bot 42/eu!", "/d", "sqlite://d.db").unwrap();
        assert_eq!(ctx.safe_resource_id(), "bot_42_eu_");
        assert_eq!(ctx.url_tracking_table(), "url_tracking_bot_42_eu_");

        let long = "x".repeat(120);
        let ctx = TenantContext::new(long, "/d", "sqlite://d.db").unwrap();
        assert_eq!(ctx.safe_resource_id().len(), 80);
    }
}
