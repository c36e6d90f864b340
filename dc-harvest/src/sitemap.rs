//! Sitemap discovery: explicit URL, conventional locations, nested
//! sitemap indexes, and a regex fallback for malformed XML.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Conventional sitemap locations probed when none is supplied.
pub fn conventional_sitemap_urls(start_url: &Url) -> Vec<String> {
    let Some(host) = start_url.host_str() else {
        return Vec::new();
    };
    let base = format!("{}://{}", start_url.scheme(), host);
    [
        "/sitemap.xml",
        "/sitemap_index.xml",
        "/sitemaps.xml",
        "/sitemap/sitemap.xml",
    ]
    .iter()
    .map(|path| format!("{base}{path}"))
    .collect()
}

/// A `<loc>` entry: either a content page or a nested sitemap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SitemapEntry {
    Page(String),
    Nested(String),
}

static LOC_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<loc>\s*(https?://[^<\s]+)\s*</loc>").expect("loc regex"));

/// Parses a sitemap or sitemap-index body.
///
/// The lenient HTML parser copes with most real-world sitemap XML; when it
/// yields nothing, raw `<loc>` harvesting takes over.
pub fn parse_sitemap(body: &str) -> Vec<SitemapEntry> {
    let doc = Html::parse_document(body);
    let nested_selector = Selector::parse("sitemap > loc").expect("selector");
    let page_selector = Selector::parse("url > loc").expect("selector");

    let mut entries = Vec::new();
    for el in doc.select(&nested_selector) {
        let loc: String = el.text().collect::<String>().trim().to_string();
        if !loc.is_empty() {
            entries.push(SitemapEntry::Nested(loc));
        }
    }
    for el in doc.select(&page_selector) {
        let loc: String = el.text().collect::<String>().trim().to_string();
        if !loc.is_empty() {
            entries.push(SitemapEntry::Page(loc));
        }
    }

    if entries.is_empty() {
        for caps in LOC_FALLBACK.captures_iter(body) {
            entries.push(SitemapEntry::Page(caps[1].trim().to_string()));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventional_locations_derive_from_start_url() {
        let start = Url::parse("https://x.test/landing?ref=1").unwrap();
        let urls = conventional_sitemap_urls(&start);
        assert_eq!(urls[0], "https://x.test/sitemap.xml");
        assert_eq!(urls.len(), 4);
    }

    #[test]
    fn parses_url_entries() {
        let body = r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://x.test/a</loc></url>
  <url><loc>https://x.test/b</loc></url>
</urlset>"#;
        let entries = parse_sitemap(body);
        assert_eq!(
            entries,
            vec![
                SitemapEntry::Page("https://x.test/a".into()),
                SitemapEntry::Page("https://x.test/b".into()),
            ]
        );
    }

    #[test]
    fn parses_nested_sitemap_indexes() {
        let body = r#"<sitemapindex>
  <sitemap><loc>https://x.test/sitemap-posts.xml</loc></sitemap>
</sitemapindex>"#;
        let entries = parse_sitemap(body);
        assert_eq!(
            entries,
            vec![SitemapEntry::Nested("https://x.test/sitemap-posts.xml".into())]
        );
    }

    #[test]
    fn regex_fallback_handles_malformed_xml() {
        let body = "garbage <loc>https://x.test/only</loc> trailing";
        let entries = parse_sitemap(body);
        assert_eq!(entries, vec![SitemapEntry::Page("https://x.test/only".into())]);
    }
}
