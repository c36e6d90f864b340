//! Tenant record store: leads and URL-tracking rows in SQLite via sqlx.
//!
//! Opening the store drops legacy unique indexes that would reject
//! duplicate emails and guarantees exactly one lead row per session via a
//! unique index on `session_id`. The URL-tracking table is per tenant
//! (`url_tracking_{safe_resource_id}`) with a unique index on `url`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::DocentError;
use crate::tenant::TenantContext;

/// Lifecycle of a lead record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeadStatus {
    Partial,
    PhoneCollected,
    Complete,
    Updated,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Partial => "partial",
            LeadStatus::PhoneCollected => "phone_collected",
            LeadStatus::Complete => "complete",
            LeadStatus::Updated => "updated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "partial" => Some(LeadStatus::Partial),
            "phone_collected" => Some(LeadStatus::PhoneCollected),
            "complete" => Some(LeadStatus::Complete),
            "updated" => Some(LeadStatus::Updated),
            _ => None,
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lead row; exactly one per chat session.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LeadRecord {
    pub session_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub original_question: String,
    pub source: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_contact: DateTime<Utc>,
}

/// One URL-tracking row; exactly one per canonical URL.
#[derive(Clone, Debug, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    pub content_hash: String,
    pub last_checked: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    url_tracking_table: String,
}

impl RecordStore {
    /// Connects to the tenant's record store and prepares both tables.
    pub async fn connect(ctx: &TenantContext) -> Result<Self, DocentError> {
        let uri = ctx.record_store_uri.as_str();
        let options = if uri.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(uri)
                .map_err(|e| DocentError::TenantContext(format!("invalid record_store_uri: {e}")))?
        } else {
            SqliteConnectOptions::new().filename(uri)
        }
        .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DocentError::Unavailable(format!("record store: {e}")))?;

        let store = Self {
            pool,
            url_tracking_table: ctx.url_tracking_table(),
        };
        store.init_schema().await?;
        info!(
            resource_id = %ctx.resource_id,
            url_tracking = %store.url_tracking_table,
            "record store ready"
        );
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), DocentError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS leads (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_id TEXT NOT NULL,
                 name TEXT NOT NULL DEFAULT '',
                 phone TEXT NOT NULL DEFAULT '',
                 email TEXT NOT NULL DEFAULT '',
                 original_question TEXT NOT NULL DEFAULT '',
                 source TEXT NOT NULL DEFAULT '',
                 status TEXT NOT NULL DEFAULT 'partial',
                 created_at TEXT NOT NULL,
                 last_contact TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        // Older deployments carried unique indexes keyed on email; they
        // reject duplicate emails across sessions and must go.
        for legacy in ["leads_email_unique", "chatbot_session_email_idx", "email_1"] {
            if let Err(e) = sqlx::query(&format!("DROP INDEX IF EXISTS {legacy}"))
                .execute(&self.pool)
                .await
            {
                debug!(index = legacy, error = %e, "legacy index drop skipped");
            }
        }

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS chatbot_session_idx ON leads(session_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS chatbot_created_at_idx ON leads(created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                 url TEXT NOT NULL,
                 content_hash TEXT NOT NULL,
                 last_checked TEXT NOT NULL,
                 last_modified TEXT NOT NULL
             )",
            self.url_tracking_table
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {}_url_idx ON {}(url)",
            self.url_tracking_table, self.url_tracking_table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Leads ──────────────────────────────────────────────────────────

    /// Creates the partial lead row written at name capture.
    ///
    /// Upserts on `session_id` so a replayed name message cannot produce a
    /// second row.
    pub async fn insert_partial_lead(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<(), DocentError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO leads
                 (session_id, name, phone, email, original_question, source, status, created_at, last_contact)
             VALUES (?1, ?2, '', '', 'Name collection', 'name_collection', 'partial', ?3, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                 name = excluded.name,
                 last_contact = excluded.last_contact",
        )
        .bind(session_id)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Moves a still-partial lead to `phone_collected`. Returns rows changed.
    pub async fn mark_phone_collected(
        &self,
        session_id: &str,
        phone: &str,
        original_question: &str,
    ) -> Result<u64, DocentError> {
        let result = sqlx::query(
            "UPDATE leads SET phone = ?2, original_question = ?3,
                 status = 'phone_collected', last_contact = ?4
             WHERE session_id = ?1 AND status = 'partial'",
        )
        .bind(session_id)
        .bind(phone)
        .bind(original_question)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Completes the session's lead with phone and email, inserting a full
    /// row if the session never produced a partial one.
    pub async fn complete_lead(
        &self,
        session_id: &str,
        name: &str,
        phone: &str,
        email: &str,
        original_question: &str,
    ) -> Result<(), DocentError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO leads
                 (session_id, name, phone, email, original_question, source, status, created_at, last_contact)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pricing_inquiry', 'complete', ?6, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
                 phone = CASE WHEN excluded.phone != '' THEN excluded.phone ELSE leads.phone END,
                 email = excluded.email,
                 original_question = excluded.original_question,
                 status = 'complete',
                 last_contact = excluded.last_contact",
        )
        .bind(session_id)
        .bind(name)
        .bind(phone)
        .bind(email)
        .bind(original_question)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_lead(&self, session_id: &str) -> Result<Option<LeadRecord>, DocentError> {
        let row = sqlx::query(
            "SELECT session_id, name, phone, email, original_question, source, status,
                    created_at, last_contact
             FROM leads WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| lead_from_row(&r)))
    }

    pub async fn all_leads(&self) -> Result<Vec<LeadRecord>, DocentError> {
        let rows = sqlx::query(
            "SELECT session_id, name, phone, email, original_question, source, status,
                    created_at, last_contact
             FROM leads ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(lead_from_row).collect())
    }

    pub async fn leads_count(&self) -> Result<u64, DocentError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM leads")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }

    // ── URL tracking ───────────────────────────────────────────────────

    pub async fn lookup_url(&self, url: &str) -> Result<Option<UrlRecord>, DocentError> {
        let row = sqlx::query(&format!(
            "SELECT url, content_hash, last_checked, last_modified
             FROM {} WHERE url = ?1",
            self.url_tracking_table
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UrlRecord {
            url: r.get("url"),
            content_hash: r.get("content_hash"),
            last_checked: r.get("last_checked"),
            last_modified: r.get("last_modified"),
        }))
    }

    /// Records a NEW or MODIFIED page: content hash plus both timestamps.
    pub async fn upsert_url(&self, url: &str, content_hash: &str) -> Result<(), DocentError> {
        let now = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {} (url, content_hash, last_checked, last_modified)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(url) DO UPDATE SET
                 content_hash = excluded.content_hash,
                 last_checked = excluded.last_checked,
                 last_modified = excluded.last_modified",
            self.url_tracking_table
        ))
        .bind(url)
        .bind(content_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records an UNCHANGED page: `last_checked` only.
    pub async fn touch_url(&self, url: &str) -> Result<(), DocentError> {
        sqlx::query(&format!(
            "UPDATE {} SET last_checked = ?2 WHERE url = ?1",
            self.url_tracking_table
        ))
        .bind(url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn lead_from_row(row: &sqlx::sqlite::SqliteRow) -> LeadRecord {
    LeadRecord {
        session_id: row.get("session_id"),
        name: row.get("name"),
        phone: row.get("phone"),
        email: row.get("email"),
        original_question: row.get("original_question"),
        source: row.get("source"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        last_contact: row.get("last_contact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, RecordStore) {
        let dir = tempdir().unwrap();
        let uri = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("records.db").display()
        );
        let ctx = TenantContext::new("tenant-a", "/tmp/va", uri).unwrap();
        let store = RecordStore::connect(&ctx).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn lead_lifecycle_partial_to_complete() {
        let (_dir, store) = store().await;

        store.insert_partial_lead("s1", "Alice").await.unwrap();
        let lead = store.find_lead("s1").await.unwrap().unwrap();
        assert_eq!(lead.status, "partial");
        assert_eq!(lead.name, "Alice");
        assert_eq!(lead.source, "name_collection");

        let changed = store
            .mark_phone_collected("s1", "415-555-2671", "pricing?")
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            store.find_lead("s1").await.unwrap().unwrap().status,
            "phone_collected"
        );

        store
            .complete_lead("s1", "Alice", "", "alice@example.com", "pricing?")
            .await
            .unwrap();
        let lead = store.find_lead("s1").await.unwrap().unwrap();
        assert_eq!(lead.status, "complete");
        assert_eq!(lead.email, "alice@example.com");
        // Empty phone in the completion must not clobber the stored one.
        assert_eq!(lead.phone, "415-555-2671");

        assert_eq!(store.leads_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn phone_update_requires_partial_status() {
        let (_dir, store) = store().await;
        store.insert_partial_lead("s1", "Alice").await.unwrap();
        store
            .mark_phone_collected("s1", "415-555-2671", "q")
            .await
            .unwrap();
        // Already phone_collected: a second inline phone changes nothing.
        let changed = store
            .mark_phone_collected("s1", "999-999-9999", "q")
            .await
            .unwrap();
        assert_eq!(changed, 0);
    }

    #[tokio::test]
    async fn one_row_per_session() {
        let (_dir, store) = store().await;
        store.insert_partial_lead("s1", "Alice").await.unwrap();
        store.insert_partial_lead("s1", "Alice B.").await.unwrap();
        assert_eq!(store.leads_count().await.unwrap(), 1);
        assert_eq!(store.find_lead("s1").await.unwrap().unwrap().name, "Alice B.");
    }

    #[tokio::test]
    async fn duplicate_emails_across_sessions_are_allowed() {
        let (_dir, store) = store().await;
        store
            .complete_lead("s1", "A", "1234567890", "same@example.com", "q1")
            .await
            .unwrap();
        store
            .complete_lead("s2", "B", "0987654321", "same@example.com", "q2")
            .await
            .unwrap();
        assert_eq!(store.leads_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn url_tracking_hash_and_touch() {
        let (_dir, store) = store().await;
        assert!(store.lookup_url("https://x.test/a").await.unwrap().is_none());

        store.upsert_url("https://x.test/a", "hash-1").await.unwrap();
        let first = store.lookup_url("https://x.test/a").await.unwrap().unwrap();
        assert_eq!(first.content_hash, "hash-1");

        store.touch_url("https://x.test/a").await.unwrap();
        let touched = store.lookup_url("https://x.test/a").await.unwrap().unwrap();
        assert_eq!(touched.content_hash, "hash-1");
        assert_eq!(touched.last_modified, first.last_modified);
        assert!(touched.last_checked >= first.last_checked);

        store.upsert_url("https://x.test/a", "hash-2").await.unwrap();
        let modified = store.lookup_url("https://x.test/a").await.unwrap().unwrap();
        assert_eq!(modified.content_hash, "hash-2");
        assert!(modified.last_modified >= first.last_modified);
    }
}
