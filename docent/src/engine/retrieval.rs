//! Multi-pass candidate generation over the tenant's vector collection.
//!
//! Three passes whose results are unioned in first-seen order: a
//! comprehensive embedding pass (primary query, per-word diversification,
//! keyword-bucket expansions, literal variants), a literal-text pass on the
//! normalized query, and an entity pass over capitalized tokens.

use chrono::Datelike;
use rustc_hash::FxHashSet;
use tracing::debug;

use super::Engine;
use crate::stores::ScoredChunk;

const PRIMARY_LIMIT: usize = 50;
const WORD_LIMIT: usize = 25;
const EXPANDED_LIMIT: usize = 20;
const VARIANT_LIMIT: usize = 40;
const LITERAL_LIMIT: usize = 50;
const ENTITY_LIMIT: usize = 30;
const COMPREHENSIVE_CAP: usize = 80;

const FOUNDING_CUES: &[&str] = &["founded", "establish", "start", "began", "create"];
const FOUNDING_TERMS: &[&str] = &[
    "founded",
    "established",
    "started",
    "began",
    "created",
    "inception",
    "formation",
];
const YEAR_CUES: &[&str] = &["year", "when", "date", "time"];
const COMPANY_CUES: &[&str] = &["company", "business", "organization"];
const COMPANY_TERMS: &[&str] = &["company", "business", "organization", "corporation", "firm"];
const LEADERSHIP_CUES: &[&str] = &["head", "ceo", "leader", "manager", "director"];
const LEADERSHIP_TERMS: &[&str] = &[
    "CEO",
    "head",
    "director",
    "manager",
    "leader",
    "president",
    "founder",
];
/// Sliding window of recent years considered for "when"-style questions.
const YEAR_WINDOW: i32 = 20;

/// Strips trailing sentence punctuation for literal passes.
pub(crate) fn normalize_query(question: &str) -> String {
    question
        .trim()
        .trim_end_matches(['?', '.', '!', ',', ';'])
        .to_string()
}

struct CandidateUnion {
    docs: Vec<ScoredChunk>,
    seen: FxHashSet<String>,
}

impl CandidateUnion {
    fn new() -> Self {
        Self {
            docs: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    /// Appends unseen documents, preserving first-seen order. Documents are
    /// identified by their text, so the same chunk reached through two
    /// passes counts once.
    fn extend(&mut self, hits: impl IntoIterator<Item = ScoredChunk>, cap: Option<usize>) {
        for hit in hits {
            if let Some(cap) = cap {
                if self.docs.len() >= cap {
                    return;
                }
            }
            let text = hit.document.text.trim();
            if text.is_empty() {
                continue;
            }
            if self.seen.insert(text.to_string()) {
                self.docs.push(hit);
            }
        }
    }
}

impl Engine {
    /// Runs all three retrieval passes and returns the deduplicated union.
    pub(crate) async fn multi_pass_retrieve(&self, question: &str) -> Vec<ScoredChunk> {
        let normalized = normalize_query(question);
        let mut union = CandidateUnion::new();

        // Pass 1: comprehensive embedding retrieval, capped at 80.
        let pass1 = self.comprehensive_retrieve(question).await;
        union.extend(pass1, Some(COMPREHENSIVE_CAP));
        let after_pass1 = union.docs.len();

        // Pass 2: literal text of the normalized query.
        union.extend(self.search_text(&normalized, LITERAL_LIMIT).await, None);

        // Pass 3: capitalized entity tokens.
        let entities: Vec<&str> = question
            .split_whitespace()
            .filter(|w| w.chars().count() > 2 && w.chars().next().is_some_and(char::is_uppercase))
            .take(5)
            .collect();
        if !entities.is_empty() {
            let entity_query = entities.join(" ");
            union.extend(self.search_text(&entity_query, ENTITY_LIMIT).await, None);
        }

        debug!(
            pass1 = after_pass1,
            total = union.docs.len(),
            "multi-pass retrieval complete"
        );
        union.docs
    }

    /// Pass 1: primary embedding search plus diversification queries.
    async fn comprehensive_retrieve(&self, question: &str) -> Vec<ScoredChunk> {
        let mut union = CandidateUnion::new();

        union.extend(self.search_text(question, PRIMARY_LIMIT).await, None);

        // Per-word diversification.
        let words: Vec<String> = question
            .split_whitespace()
            .map(|w| w.to_lowercase().trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| w.chars().count() > 2)
            .collect();
        for word in &words {
            union.extend(self.search_text(word, WORD_LIMIT).await, None);
        }

        // Keyword-bucket expansions.
        for term in expanded_terms(question) {
            if term.chars().count() > 1 {
                union.extend(self.search_text(&term, EXPANDED_LIMIT).await, None);
            }
        }

        // Literal question variants: raw, stop-word-light, content words.
        let variants = [
            question.to_string(),
            stop_word_light(question),
            words.join(" "),
        ];
        for variant in variants {
            if variant.trim().chars().count() > 3 {
                union.extend(self.search_text(variant.trim(), VARIANT_LIMIT).await, None);
            }
        }

        union.docs.truncate(COMPREHENSIVE_CAP);
        union.docs
    }
}

/// Expansion terms derived from keyword buckets in the question.
fn expanded_terms(question: &str) -> Vec<String> {
    let q = question.to_lowercase();
    let mut terms: Vec<String> = Vec::new();

    if FOUNDING_CUES.iter().any(|cue| q.contains(cue)) {
        terms.extend(FOUNDING_TERMS.iter().map(|t| t.to_string()));
    }
    if YEAR_CUES.iter().any(|cue| q.contains(cue)) {
        let current = chrono::Utc::now().year();
        terms.extend((current - YEAR_WINDOW..=current).map(|y| y.to_string()));
    }
    if COMPANY_CUES.iter().any(|cue| q.contains(cue)) {
        terms.extend(COMPANY_TERMS.iter().map(|t| t.to_string()));
    }
    if LEADERSHIP_CUES.iter().any(|cue| q.contains(cue)) {
        terms.extend(LEADERSHIP_TERMS.iter().map(|t| t.to_string()));
    }

    terms
}

/// Removes the weak copular words that dominate embedding noise.
fn stop_word_light(question: &str) -> String {
    question
        .split_whitespace()
        .filter(|w| {
            let lower = w.to_lowercase();
            lower != "was" && lower != "is"
        })
        .collect::<Vec<_>>()
        .join(" ")
}
