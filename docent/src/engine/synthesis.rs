//! Grounded answer synthesis over reranked passages.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error};

use super::Engine;
use super::chat::location_query;
use crate::error::DocentError;
use crate::models::GenerationOptions;

/// Passages fed to the generator.
const CONTEXT_PASSAGES: usize = 12;
/// Rerank depth when feeding the synthesizer.
const SYNTHESIS_TOPN: usize = 40;
/// Source snippets stored per session.
const SOURCE_SNIPPETS: usize = 5;
/// Stored snippets are truncated to this many characters.
const SNIPPET_MAX_LEN: usize = 240;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern"));

const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant information to answer your question.";
const SYNTHESIS_FAILED_ANSWER: &str =
    "I found relevant information but encountered an error while generating the response.";

impl Engine {
    /// Full retrieval + synthesis path for a general question.
    pub(crate) async fn answer_with_retrieval(
        &self,
        question: &str,
        session_id: &str,
    ) -> Result<String, DocentError> {
        let candidates = self.multi_pass_retrieve(question).await;
        let reranked = self.rerank(question, &candidates, Some(SYNTHESIS_TOPN)).await;

        let answer = self.synthesize(question, &reranked).await;

        self.sessions.with_session(session_id, |_, scratch| {
            scratch.last_sources = reranked
                .iter()
                .take(SOURCE_SNIPPETS)
                .map(|doc| snippet(doc))
                .collect();
            scratch.last_question = Some(question.to_string());
            scratch.last_answer = Some(answer.clone());
        });

        Ok(answer)
    }

    async fn synthesize(&self, question: &str, docs: &[String]) -> String {
        if docs.is_empty() {
            return NO_CONTEXT_ANSWER.to_string();
        }

        let context = docs
            .iter()
            .take(CONTEXT_PASSAGES)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = build_prompt(question, &context);

        match self
            .generator
            .generate(&prompt, GenerationOptions::default())
            .await
        {
            Ok(answer) if !answer.trim().is_empty() => {
                let answer = answer.trim().to_string();
                debug!(length = answer.len(), "answer generated");
                if location_query(question) {
                    answer
                } else {
                    strip_source_leakage(&answer)
                }
            }
            Ok(_) => SYNTHESIS_FAILED_ANSWER.to_string(),
            Err(e) => {
                error!(error = %e, "answer synthesis failed");
                SYNTHESIS_FAILED_ANSWER.to_string()
            }
        }
    }
}

fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions accurately using the provided context.

CONTEXT:
{context}

INSTRUCTIONS:
1. Read ALL context passages carefully, even if formatting appears unclear.
2. Extract relevant information from the context to answer the question.
3. Combine information from multiple passages when needed to form complete answers.
4. Provide clear, factual answers in 2-3 sentences.
5. IMPORTANT: Do NOT include any source attributions, page titles, URLs, or links unless the user explicitly asked for page locations or links (for example: \"where is this\", \"which page\", \"source\", \"link\", \"URL\", \"where did you get this\", \"about page\", or similar).
6. If the user explicitly asked for links, ONLY provide links and titles that appear in the provided context - DO NOT invent URLs or sources.
7. When providing links, format each entry exactly as:
   Page title
   https://page-url
8. If you were not explicitly asked for links, do NOT include any URLs, source lines, or link-like text in your reply.

QUESTION: {question}

ANSWER (be concise and factual):"
    )
}

/// Safety net behind the prompt: removes URLs and `source:` lines from
/// answers to questions that did not ask for locations.
fn strip_source_leakage(answer: &str) -> String {
    let without_urls = URL_PATTERN.replace_all(answer, "");
    let cleaned: String = without_urls
        .lines()
        .filter(|line| {
            let lower = line.trim().to_lowercase();
            !lower.starts_with("source:") && !lower.starts_with("sources:")
        })
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        answer.to_string()
    } else {
        cleaned.to_string()
    }
}

fn snippet(doc: &str) -> String {
    let trimmed = doc.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(SNIPPET_MAX_LEN).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_urls_and_source_lines() {
        let answer = "The company was founded in 2003.\nSee https://example.com/about for more.\nSource: about page";
        let cleaned = strip_source_leakage(answer);
        assert!(!cleaned.contains("https://"));
        assert!(!cleaned.to_lowercase().contains("source:"));
        assert!(cleaned.contains("founded in 2003"));
    }

    #[test]
    fn keeps_answer_when_cleaning_would_empty_it() {
        let answer = "https://example.com/only-a-url";
        assert_eq!(strip_source_leakage(answer), answer);
    }

    #[test]
    fn snippets_are_truncated() {
        let long = "x".repeat(500);
        let s = snippet(&long);
        assert!(s.len() <= SNIPPET_MAX_LEN + 3);
        assert!(s.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }
}
