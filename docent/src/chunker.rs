//! Sentence-boundary chunking with tail-word overlap.
//!
//! Shared by the crawl pipeline and the manual knowledge ingestion path, so
//! every chunk in a tenant's collection was produced by the same rules.

use unicode_segmentation::UnicodeSegmentation;

/// Minimum chunk size in characters; shorter chunks are dropped.
pub const MIN_CHUNK_SIZE: usize = 250;
/// Maximum chunk size in characters.
pub const MAX_CHUNK_SIZE: usize = 3_250;
/// Number of trailing words carried into the next chunk as overlap.
const TAIL_OVERLAP_WORDS: usize = 15;
/// Chunks with fewer words than this are dropped outright.
const MIN_CHUNK_WORDS: usize = 3;

/// Splits `text` into sentence-aligned chunks of 250–3,250 characters.
///
/// Sentences are appended greedily; when the next sentence would push the
/// running chunk past the cap, the chunk is emitted (if large enough) and
/// the next one is seeded with the last 15 words of the emitted chunk.
/// If nothing was emitted but the whole input clears the minimum, the input
/// becomes a single chunk.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in text.unicode_sentences() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        let candidate_len = if current.is_empty() {
            sentence.len()
        } else {
            current.len() + 1 + sentence.len()
        };

        if candidate_len > MAX_CHUNK_SIZE && !current.is_empty() {
            if current.trim().len() >= MIN_CHUNK_SIZE {
                chunks.push(current.trim().to_string());
            }

            let words: Vec<&str> = current.split_whitespace().collect();
            let overlap = words.len().min(TAIL_OVERLAP_WORDS);
            current = if overlap > 0 {
                format!("{} {}", words[words.len() - overlap..].join(" "), sentence)
            } else {
                sentence.to_string()
            };
        } else if current.is_empty() {
            current = sentence.to_string();
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
    }

    let tail = current.trim();
    if tail.len() >= MIN_CHUNK_SIZE {
        chunks.push(tail.to_string());
    }

    if chunks.is_empty() && text.trim().len() >= MIN_CHUNK_SIZE {
        chunks.push(text.trim().to_string());
    }

    chunks.retain(|c| c.split_whitespace().count() >= MIN_CHUNK_WORDS);
    chunks
}
