//! Pattern-based extraction of contact information from free text.
//!
//! Used both on incoming questions (inline phone/email submission) and on
//! retrieved passages (contact-info reporting). Deduplicates while
//! preserving first-seen order.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

static EMAIL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b",
        // Spaced-out variants that appear in obfuscated page text
        r"\b[a-zA-Z0-9._%-]+\s*@\s*[a-zA-Z0-9.-]+\s*\.\s*[a-zA-Z]{2,}\b",
        // Labeled forms: "email: user@example.com"
        r"(?i)(?:email|mail|e-mail)\s*:?\s*([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("email pattern"))
    .collect()
});

static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\+?1?[-.\s]?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}",
        r"\+?[0-9]{1,4}[-.\s]?\(?[0-9]{3,4}\)?[-.\s]?[0-9]{3,4}[-.\s]?[0-9]{4,5}",
        r"\b[0-9]{3}[-.\s][0-9]{3}[-.\s][0-9]{4}\b",
        r"\([0-9]{3}\)\s*[0-9]{3}[-.\s]?[0-9]{4}",
        // Labeled forms: "phone: +1 234 567 8900"
        r"(?i)(?:phone|tel|mobile|call)\s*:?\s*([+]?[0-9\s\-().]{7,20})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("phone pattern"))
    .collect()
});

const CONTACT_KEYWORDS: &[&str] = &[
    "contact",
    "reach",
    "email",
    "phone",
    "call",
    "write",
    "get in touch",
    "customer service",
    "support",
    "help desk",
    "sales",
    "inquiry",
    "office",
    "headquarters",
    "location",
    "address",
    "visit",
    "how to contact",
    "contact us",
    "contact information",
    "contact details",
    "get hold of",
    "email address",
    "phone number",
    "contact via email",
    "send email",
];

const EMAIL_QUERY_WORDS: &[&str] = &["email", "e-mail", "mail"];
const PHONE_QUERY_WORDS: &[&str] = &["phone", "call", "ring", "telephone", "mobile"];

/// Extraction result over a piece of text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactInfo {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
}

impl ContactInfo {
    pub fn has_contact(&self) -> bool {
        !self.emails.is_empty() || !self.phones.is_empty() || !self.addresses.is_empty()
    }

    /// Merge another extraction, keeping first-seen order.
    pub fn merge(&mut self, other: ContactInfo) {
        for email in other.emails {
            if !self.emails.contains(&email) {
                self.emails.push(email);
            }
        }
        for phone in other.phones {
            if !self.phones.contains(&phone) {
                self.phones.push(phone);
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ContactExtractor;

impl ContactExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_emails(&self, text: &str) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut emails = Vec::new();
        for pattern in EMAIL_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let raw = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let candidate: String = raw
                    .to_lowercase()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let candidate = candidate
                    .trim_matches(|c: char| ".,;:!?()[]{}\"'".contains(c))
                    .to_string();
                if !plausible_email(&candidate) {
                    continue;
                }
                if seen.insert(candidate.clone()) {
                    emails.push(candidate);
                }
            }
        }
        emails
    }

    pub fn extract_phones(&self, text: &str) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut phones = Vec::new();
        for pattern in PHONE_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let raw = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();
                let digits: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
                if digits.chars().filter(|c| c.is_ascii_digit()).count() < 10 {
                    continue;
                }
                let candidate = raw.to_string();
                if seen.insert(candidate.clone()) {
                    phones.push(candidate);
                }
            }
        }
        phones
    }

    /// Extracts everything at once. Addresses are reported but never mined.
    pub fn extract(&self, text: &str) -> ContactInfo {
        if text.trim().is_empty() {
            return ContactInfo::default();
        }
        ContactInfo {
            emails: self.extract_emails(text),
            phones: self.extract_phones(text),
            addresses: Vec::new(),
        }
    }

    /// Whether a question is asking for contact information at all.
    pub fn is_contact_query(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        CONTACT_KEYWORDS.iter().any(|kw| q.contains(kw))
    }

    pub fn asking_for_email(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        EMAIL_QUERY_WORDS.iter().any(|w| q.contains(w))
    }

    pub fn asking_for_phone(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        PHONE_QUERY_WORDS.iter().any(|w| q.contains(w))
    }

    /// Formats extracted contact info against the asked question.
    ///
    /// A question asking specifically for email never gets a phone number
    /// back (and vice versa); it gets the dedicated not-found message.
    pub fn format_response(&self, info: &ContactInfo, question: &str) -> String {
        let asking_email = self.asking_for_email(question);
        let asking_phone = self.asking_for_phone(question);

        let mut parts: Vec<String> = Vec::new();
        if asking_email && !info.emails.is_empty() {
            parts.push(format!("**Email**: {}", info.emails.join(", ")));
        } else if asking_phone && !info.phones.is_empty() {
            parts.push(format!("**Phone**: {}", info.phones.join(", ")));
        } else if !asking_email && !asking_phone {
            if !info.emails.is_empty() {
                parts.push(format!("**Email**: {}", info.emails.join(", ")));
            }
            if !info.phones.is_empty() {
                parts.push(format!("**Phone**: {}", info.phones.join(", ")));
            }
            if !info.addresses.is_empty() {
                parts.push(format!("**Address**: {}", info.addresses.join(", ")));
            }
        }

        if !parts.is_empty() {
            return format!(
                "Here's the contact information I found:\n\n{}",
                parts.join("\n\n")
            );
        }

        if asking_email {
            "I couldn't find any email addresses in the available content. Try asking for general contact information or check for a contact page.".into()
        } else if asking_phone {
            "I couldn't find any phone numbers in the available content. Try asking for general contact information or check for a contact page.".into()
        } else {
            "I couldn't find specific contact information in the available content. You might want to look for a contact page.".into()
        }
    }

    /// Focused search terms for a follow-up collection query when the
    /// initial retrieval surfaced no contact info.
    pub fn focused_search_terms(&self, question: &str) -> Vec<&'static str> {
        let q = question.to_lowercase();
        if q.contains("email") {
            vec![
                "email",
                "e-mail",
                "contact email",
                "email address",
                "send email",
                "contact us",
                "customer service",
                "support email",
            ]
        } else if PHONE_QUERY_WORDS.iter().any(|w| q.contains(w)) {
            vec![
                "phone",
                "telephone",
                "call",
                "mobile",
                "phone number",
                "contact number",
                "customer service",
                "support phone",
                "call us",
            ]
        } else {
            vec![
                "contact information",
                "contact us",
                "customer service",
                "support",
                "phone number",
                "email address",
                "office location",
                "headquarters",
                "get in touch",
                "reach us",
                "customer care",
                "help desk",
                "contact details",
            ]
        }
    }
}

fn plausible_email(candidate: &str) -> bool {
    if candidate.len() <= 5 || candidate.matches('@').count() != 1 {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.len() > 2 && domain.contains('.')
}
