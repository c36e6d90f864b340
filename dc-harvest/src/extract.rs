//! Page extraction: complementary text signals from one HTML document.
//!
//! Produces the normalized whole-body text (also the change-detection hash
//! input), the title, the meta description, a broad set of structural
//! elements, JSON-LD text, and the raw links for discovery. Candidates are
//! cleaned and filtered for boilerplate and low word variety before they
//! become items.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;
use scraper::{ElementRef, Html, Node, Selector};

/// One extractable piece of page text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedItem {
    pub text: String,
    pub content_type: String,
}

/// Everything the crawler needs from one parsed page.
#[derive(Clone, Debug, Default)]
pub struct PageExtraction {
    pub items: Vec<ExtractedItem>,
    pub title: Option<String>,
    /// Cleaned whole-body text; the change-detection hash authority.
    pub cleaned_body: String,
    pub meta_description: Option<String>,
    /// Raw `href` values in document order, before canonicalization.
    pub links: Vec<String>,
}

const MIN_ITEM_LENGTH: usize = 2;
const MIN_ITEM_WORDS: usize = 3;
const MIN_SENTENCE_LENGTH: usize = 15;
/// Sentences need at least this share of unique words.
const WORD_VARIETY_FLOOR: f64 = 0.6;
/// And at least this share of alphabetic characters.
const ALPHA_RATIO_FLOOR: f64 = 0.6;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));
static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("sentence regex"));

static BOILERPLATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Navigation
        r"\bhome\b.*\babout\b.*\bcontact\b",
        r"\bmenu\b",
        r"\bnavigation\b",
        r"\bskip to\b",
        r"\bmain content\b",
        r"\bbreadcrumb\b",
        r"\bgo to\b.*\bpage\b",
        r"\bprevious\b.*\bnext\b",
        r"^(home|about|contact|services|products|blog|news)$",
        // Social
        r"\bfollow us\b",
        r"\bshare this\b",
        r"\blike us on\b",
        r"\bfacebook\b.*\btwitter\b.*\binstagram\b",
        r"\bsocial media\b",
        r"\bsubscribe\b.*\bnewsletter\b",
        r"\bsign up\b.*\bupdates\b",
        // Legal / footer
        r"\bcopyright\b.*\d{4}",
        r"\ball rights reserved\b",
        r"\bprivacy policy\b",
        r"\bterms of service\b",
        r"\bterms and conditions\b",
        r"\bcookie policy\b",
        r"\bpowered by\b",
        r"\bdesigned by\b",
        // Generic buttons & counters
        r"^(click here|read more|learn more|view all|see all|show more)\.?$",
        r"^\d+\s+(comments?|views?|likes?|shares?)\.?$",
        r"^\w+\s*:\s*$",
        r"^(yes|no|ok|cancel|submit|send|search)\.?$",
        r"^\s*[\d\s\-()]+\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("boilerplate regex"))
    .collect()
});

struct Selectors {
    title: Selector,
    meta_description: Selector,
    structural: Vec<(Selector, &'static str)>,
    alt_images: Selector,
    json_ld: Selector,
    anchors: Selector,
    aggressive: Vec<Selector>,
    rel_next: Selector,
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| {
    let sel = |s: &str| Selector::parse(s).expect("selector");
    Selectors {
        title: sel("title"),
        meta_description: sel(r#"meta[name="description"], meta[property="og:description"]"#),
        structural: [
            ("article", "element_article"),
            ("main", "element_main"),
            ("h1", "element_h1"),
            ("h2", "element_h2"),
            ("h3", "element_h3"),
            ("h4", "element_h4"),
            ("h5", "element_h5"),
            ("h6", "element_h6"),
            ("p", "element_p"),
            ("li", "element_li"),
            ("td", "element_td"),
            ("th", "element_th"),
            ("caption", "element_caption"),
            ("figcaption", "element_figcaption"),
        ]
        .iter()
        .map(|(s, tag)| (sel(s), *tag))
        .collect(),
        alt_images: sel("img[alt]"),
        json_ld: sel(r#"script[type="application/ld+json"]"#),
        anchors: sel("a[href]"),
        aggressive: [
            "nav a[href]",
            "header a[href]",
            "footer a[href]",
            ".menu a[href]",
            ".navigation a[href]",
            ".sidebar a[href]",
            ".widget a[href]",
        ]
        .iter()
        .map(|s| sel(s))
        .collect(),
        rel_next: sel(r#"link[rel="next"], a[rel="next"]"#),
    }
});

/// Parses one HTML document and extracts every signal in a single pass.
pub fn extract_page(html: &str, aggressive_links: bool) -> PageExtraction {
    let doc = Html::parse_document(html);
    let mut extraction = PageExtraction::default();
    let mut seen_items: FxHashSet<String> = FxHashSet::default();

    let mut push_item = |extraction: &mut PageExtraction, text: &str, content_type: &str, filter_boilerplate: bool| {
        let collapsed = WHITESPACE.replace_all(text.trim(), " ").into_owned();
        if collapsed.len() < MIN_ITEM_LENGTH
            || collapsed.split_whitespace().count() < MIN_ITEM_WORDS
        {
            return;
        }
        if filter_boilerplate {
            let word_count = collapsed.split_whitespace().count();
            if is_boilerplate(&collapsed) || (word_count >= 4 && !has_word_variety(&collapsed)) {
                return;
            }
        }
        if seen_items.insert(collapsed.to_lowercase()) {
            extraction.items.push(ExtractedItem {
                text: collapsed,
                content_type: content_type.to_string(),
            });
        }
    };

    // Whole-body text: the most comprehensive signal and the hash input.
    let body_text = doc
        .root_element()
        .select(&Selector::parse("body").expect("selector"))
        .next()
        .map(element_text)
        .unwrap_or_default();
    extraction.cleaned_body = clean_webpage_text(&body_text);
    if extraction.cleaned_body.len() > 50 {
        let body = extraction.cleaned_body.clone();
        push_item(&mut extraction, &body, "full_page_text", false);
    }

    // Title: light cleaning only, never boilerplate-filtered.
    if let Some(el) = doc.select(&SELECTORS.title).next() {
        let title = WHITESPACE
            .replace_all(el.text().collect::<String>().trim(), " ")
            .into_owned();
        if title.len() >= 3 {
            extraction.title = Some(title.clone());
            push_item(&mut extraction, &title, "title", false);
        }
    }

    // Meta description.
    if let Some(el) = doc.select(&SELECTORS.meta_description).next() {
        if let Some(content) = el.value().attr("content") {
            let meta = WHITESPACE.replace_all(content.trim(), " ").into_owned();
            if meta.len() > 15 {
                extraction.meta_description = Some(meta.clone());
                push_item(&mut extraction, &meta, "meta_description", false);
            }
        }
    }

    // Structural elements.
    for (selector, content_type) in &SELECTORS.structural {
        for el in doc.select(selector) {
            let text = element_text(el);
            if text.trim().len() > 5 {
                push_item(&mut extraction, &text, content_type, true);
            }
        }
    }

    // Image alt text.
    for el in doc.select(&SELECTORS.alt_images) {
        if let Some(alt) = el.value().attr("alt") {
            if alt.trim().len() > 10 {
                push_item(&mut extraction, alt, "alt_or_caption", true);
            }
        }
    }

    // JSON-LD structured data.
    for el in doc.select(&SELECTORS.json_ld) {
        let raw: String = el.text().collect();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            let mined = mine_jsonld_text(&value);
            if mined.len() > 20 {
                push_item(&mut extraction, &mined, "structured_data", false);
            }
        }
    }

    // Links for discovery.
    let mut push_link = |href: &str| {
        let href = href.trim();
        if !href.is_empty() {
            extraction.links.push(href.to_string());
        }
    };
    for el in doc.select(&SELECTORS.anchors) {
        if let Some(href) = el.value().attr("href") {
            push_link(href);
        }
    }
    if aggressive_links {
        for selector in &SELECTORS.aggressive {
            for el in doc.select(selector) {
                if let Some(href) = el.value().attr("href") {
                    push_link(href);
                }
            }
        }
        for el in doc.select(&SELECTORS.rel_next) {
            if let Some(href) = el.value().attr("href") {
                push_link(href);
            }
        }
    }

    extraction
}

/// Text content of an element, skipping script/style/noscript/template
/// subtrees.
fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    let mut stack: Vec<_> = el.children().rev().collect();
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            Node::Element(element) => {
                if !matches!(element.name(), "script" | "style" | "noscript" | "template") {
                    for child in node.children().rev() {
                        stack.push(child);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Cleans whole-body text down to retrieval-quality sentences: collapsed
/// whitespace, boilerplate and repeated sentences removed, low-variety and
/// low-alphabetic runs dropped.
pub fn clean_webpage_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");

    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut kept: Vec<&str> = Vec::new();

    for sentence in SENTENCE_SPLIT.split(&collapsed) {
        let sentence = sentence.trim();
        if sentence.len() < MIN_SENTENCE_LENGTH {
            continue;
        }
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.len() < 2 {
            continue;
        }
        let lower = sentence.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        if is_boilerplate(sentence) {
            continue;
        }
        if !has_word_variety(sentence) {
            continue;
        }
        let alpha = sentence.chars().filter(|c| c.is_alphabetic()).count();
        if (alpha as f64) / (sentence.chars().count() as f64) < ALPHA_RATIO_FLOOR {
            continue;
        }
        seen.insert(lower);
        kept.push(sentence);
    }

    kept.join(" ")
}

fn is_boilerplate(text: &str) -> bool {
    let lower = text.to_lowercase();
    if BOILERPLATE_PATTERNS.iter().any(|p| p.is_match(&lower)) {
        return true;
    }
    // Heavily repeated single words read as navigation debris.
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.len() > 2 {
        let mut counts: rustc_hash::FxHashMap<&str, usize> = rustc_hash::FxHashMap::default();
        for w in &words {
            *counts.entry(w).or_default() += 1;
        }
        let most_common = counts.values().copied().max().unwrap_or(0);
        if (most_common as f64) / (words.len() as f64) > 0.5 {
            return true;
        }
    }
    false
}

fn has_word_variety(text: &str) -> bool {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.len() < 4 {
        return false;
    }
    let unique: FxHashSet<&String> = words.iter().collect();
    (unique.len() as f64) / (words.len() as f64) >= WORD_VARIETY_FLOOR
}

/// Collects meaningful text fields from JSON-LD blocks.
fn mine_jsonld_text(value: &serde_json::Value) -> String {
    const TEXT_FIELDS: &[&str] = &[
        "name",
        "title",
        "description",
        "text",
        "articleBody",
        "headline",
        "summary",
    ];
    let mut parts: Vec<String> = Vec::new();
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            serde_json::Value::Object(map) => {
                for field in TEXT_FIELDS {
                    if let Some(serde_json::Value::String(s)) = map.get(*field) {
                        parts.push(s.trim().to_string());
                    }
                }
                stack.extend(map.values());
            }
            serde_json::Value::Array(items) => stack.extend(items),
            serde_json::Value::String(s) if s.trim().len() > 20 => {
                parts.push(s.trim().to_string());
            }
            _ => {}
        }
    }
    parts.dedup();
    parts.join(" ")
}
