//! Location fast-path: deterministic URL selection for "which page" asks.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::Engine;

const POSITIVE_TERMS: &[&str] = &["about", "who we are", "company", "our story", "mission"];
const NEGATIVE_PATH_SEGMENTS: &[&str] = &["/blog", "/category", "/tag"];
const POSITIVE_WEIGHT: i64 = 2;
const NEGATIVE_WEIGHT: i64 = 5;

struct UrlCandidate {
    score: i64,
    title: String,
}

impl Engine {
    /// Scores candidate URLs for a location query and returns exactly
    /// `"{title}\n{url}"` for the winner, or `None` when no candidate
    /// carries a URL (the caller falls through to the normal flow).
    pub(crate) async fn answer_location_query(&self, question: &str) -> Option<String> {
        let hits = self.search_text(question, 50).await;

        let mut candidates: FxHashMap<String, UrlCandidate> = FxHashMap::default();
        for hit in &hits {
            let Some(url) = hit.document.metadata.url.as_deref() else {
                continue;
            };
            let url = url.trim();
            if url.is_empty() {
                continue;
            }

            let title = hit
                .document
                .metadata
                .page_title
                .clone()
                .or_else(|| hit.document.metadata.domain.clone())
                .unwrap_or_else(|| url.to_string());

            let entry = candidates
                .entry(url.to_string())
                .or_insert(UrlCandidate { score: 0, title });

            let mut check_text = hit.document.text.to_lowercase();
            if let Some(page_title) = &hit.document.metadata.page_title {
                check_text.push(' ');
                check_text.push_str(&page_title.to_lowercase());
            }
            for term in POSITIVE_TERMS {
                if check_text.contains(term) {
                    entry.score += POSITIVE_WEIGHT;
                }
            }

            let low_url = url.to_lowercase();
            for segment in NEGATIVE_PATH_SEGMENTS {
                if low_url.contains(segment) {
                    entry.score -= NEGATIVE_WEIGHT;
                }
            }
        }

        if candidates.is_empty() {
            return None;
        }

        // Deterministic selection: highest score, ties broken by URL.
        let mut ranked: Vec<(String, UrlCandidate)> = candidates.into_iter().collect();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(&b.0)));
        let (url, best) = &ranked[0];
        debug!(url = %url, score = best.score, "location fast-path selected");
        Some(format!("{}\n{}", best.title.trim(), url))
    }
}
