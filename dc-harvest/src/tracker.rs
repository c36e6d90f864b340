//! Change detection against the tenant's URL-tracking rows.
//!
//! The hash authority is the cleaned whole-body text computed before
//! extraction; exactly one writer updates a URL's row per crawl of that
//! page, so retrieval cleaning and change detection can never disagree.

use docent::error::DocentError;
use docent::stores::RecordStore;
use sha2::{Digest, Sha256};
use tracing::debug;

/// What the tracker decided about a fetched page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Never seen: record and extract.
    New,
    /// Content hash differs: re-record and re-extract.
    Modified,
    /// Hash matches: touch `last_checked`, follow links only.
    Unchanged,
}

pub struct ChangeTracker {
    records: RecordStore,
}

impl ChangeTracker {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    pub fn content_hash(cleaned_body: &str) -> String {
        hex::encode(Sha256::digest(cleaned_body.as_bytes()))
    }

    /// Looks up the URL, records the observation, and reports the status.
    pub async fn check_and_record(
        &self,
        url: &str,
        cleaned_body: &str,
    ) -> Result<ChangeStatus, DocentError> {
        let hash = Self::content_hash(cleaned_body);
        let status = match self.records.lookup_url(url).await? {
            None => {
                self.records.upsert_url(url, &hash).await?;
                ChangeStatus::New
            }
            Some(existing) if existing.content_hash != hash => {
                self.records.upsert_url(url, &hash).await?;
                ChangeStatus::Modified
            }
            Some(_) => {
                self.records.touch_url(url).await?;
                ChangeStatus::Unchanged
            }
        };
        debug!(url, ?status, "change detection");
        Ok(status)
    }
}
