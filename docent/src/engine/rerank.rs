//! Hybrid reranking: cross-encoder score plus keyword-match boost.

use tracing::warn;

use super::Engine;
use crate::stores::ScoredChunk;

/// Boost added per question keyword (length > 3) present in a document.
const KEYWORD_BOOST: f32 = 0.3;

impl Engine {
    /// Reranks candidates and returns the top `topn` document texts.
    ///
    /// `score = cross_encoder(question, doc) + 0.3 · |matched keywords|`,
    /// sorted descending with input order breaking ties. The result is
    /// always a subset of `candidates` with each document at most once.
    pub(crate) async fn rerank(
        &self,
        question: &str,
        candidates: &[ScoredChunk],
        topn: Option<usize>,
    ) -> Vec<String> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let docs: Vec<String> = candidates
            .iter()
            .map(|c| c.document.text.clone())
            .collect();

        let semantic_scores = match self.reranker.score(question, &docs).await {
            Ok(scores) if scores.len() == docs.len() => scores,
            Ok(scores) => {
                warn!(
                    expected = docs.len(),
                    got = scores.len(),
                    "cross-encoder returned wrong score count; keeping input order"
                );
                vec![0.0; docs.len()]
            }
            Err(e) => {
                warn!(error = %e, "cross-encoder failed; keeping input order");
                vec![0.0; docs.len()]
            }
        };

        let k = topn.unwrap_or(self.max_passages);
        rank_documents(question, &docs, &semantic_scores, k)
            .into_iter()
            .map(|i| docs[i].clone())
            .collect()
    }
}

/// Returns the indices of the top `k` documents under the hybrid score,
/// ties broken by input order.
fn rank_documents(question: &str, docs: &[String], semantic: &[f32], k: usize) -> Vec<usize> {
    let keywords: Vec<String> = question
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 3)
        .collect();

    let mut scored: Vec<(usize, f32)> = docs
        .iter()
        .zip(semantic)
        .enumerate()
        .map(|(i, (doc, semantic))| {
            let doc_lower = doc.to_lowercase();
            let matches = keywords.iter().filter(|kw| doc_lower.contains(*kw)).count();
            (i, semantic + matches as f32 * KEYWORD_BOOST)
        })
        .collect();

    // Stable sort: equal scores keep candidate-union order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn keyword_boost_lifts_matching_documents() {
        let docs = docs(&[
            "nothing relevant here",
            "pricing details for the enterprise plan",
        ]);
        // Identical semantic scores: the boost decides.
        let order = rank_documents("enterprise pricing", &docs, &[0.5, 0.5], 2);
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn ties_keep_input_order() {
        let docs = docs(&["first", "second", "third"]);
        let order = rank_documents("zzzz", &docs, &[0.1, 0.1, 0.1], 3);
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn result_is_a_subset_with_unique_members() {
        let docs = docs(&["a", "b", "c", "d", "e"]);
        let order = rank_documents("query", &docs, &[0.9, 0.1, 0.5, 0.3, 0.7], 3);
        assert_eq!(order.len(), 3);
        let mut seen = std::collections::HashSet::new();
        for i in &order {
            assert!(*i < docs.len());
            assert!(seen.insert(*i));
        }
        assert_eq!(order, vec![0, 4, 2]);
    }

    #[test]
    fn short_keywords_do_not_boost() {
        let docs = docs(&["the cat sat", "irrelevant"]);
        // "cat" has length 3: below the boost threshold.
        let order = rank_documents("the cat", &docs, &[0.0, 0.0], 2);
        assert_eq!(order, vec![0, 1]);
    }
}
