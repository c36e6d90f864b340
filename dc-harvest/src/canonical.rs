//! URL canonicalization and crawl-scope filtering.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Query parameters stripped during canonicalization, plus anything with a
/// `utm_` or `hsa_` prefix.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "mc_cid",
    "mc_eid",
    "igshid",
    "ref",
    "ref_src",
    "mkt_tok",
    "yclid",
    "msclkid",
];

/// Path extensions that are never crawlable content.
pub const SKIP_EXTENSIONS: &[&str] = &[
    // Documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".rtf", ".odt", ".ods", ".odp",
    ".txt", ".csv",
    // Archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2",
    // Executables
    ".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm",
    // Media
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".ico", ".webp", ".mp4", ".avi", ".mov", ".wmv",
    ".flv", ".mkv", ".webm", ".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma",
    // Web assets
    ".css", ".js", ".xml", ".json", ".rss", ".atom",
    // Fonts
    ".ttf", ".otf", ".woff", ".woff2", ".eot",
];

/// Download-directory prefixes that combined with a denied extension mark
/// a file URL.
const DOWNLOAD_PATH_HINTS: &[&str] = &[
    "/wp-content/uploads/",
    "/downloads/",
    "/files/",
    "/assets/uploads/",
    "/media/uploads/",
    "/static/files/",
];

/// Non-content endpoints never followed.
const EXCLUDED_LINK_PATTERNS: &[&str] = &[
    "/wp-admin/",
    "/admin/",
    "/login/",
    "/register/",
    "/wp-login.php",
    "/wp-register.php",
    "?action=logout",
    "?action=login",
    "/feed/",
    "/rss/",
    "/atom/",
    "?format=rss",
    "?format=atom",
];

const MAX_URL_LENGTH: usize = 2_000;

static DOUBLE_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//+").expect("path regex"));

/// Canonical form: no fragment, no tracking parameters, collapsed slashes.
pub fn canonicalize(raw: &str) -> Option<String> {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let mut url = Url::parse(&with_scheme).ok()?;

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            !TRACKING_PARAMS.contains(&k.as_ref())
                && !k.starts_with("utm_")
                && !k.starts_with("hsa_")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let clean_path = DOUBLE_SLASH.replace_all(url.path(), "/").into_owned();
    let clean_path = if clean_path.is_empty() { "/".to_string() } else { clean_path };
    url.set_path(&clean_path);

    Some(url.to_string())
}

/// Whether a URL is in crawl scope: in-domain, not a binary asset, not
/// absurdly long.
pub fn should_process(url: &str, allowed_domain: &str) -> bool {
    if url.len() > MAX_URL_LENGTH {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if !host.contains(allowed_domain) {
        return false;
    }

    let path = parsed.path().to_lowercase();
    if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    if DOWNLOAD_PATH_HINTS.iter().any(|hint| path.contains(hint))
        && SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    {
        return false;
    }
    true
}

/// Whether a discovered link should be followed at all.
pub fn should_follow(url: &str) -> bool {
    let lower = url.to_lowercase();
    !EXCLUDED_LINK_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Crawl priority hint for a link, clamped to [10, 100]. Content-ish paths
/// rank up; deep paths and long query strings rank down.
pub fn link_priority(url: &str) -> i32 {
    const CONTENT_HINTS: &[&str] = &[
        "/about", "/services", "/products", "/contact", "/blog", "/news", "/article", "/post",
        "/category", "/tag", "/archive", "/page", "/author",
    ];
    let Ok(parsed) = Url::parse(url) else {
        return 50;
    };
    let path = parsed.path().to_lowercase();
    let mut base = 50;
    if CONTENT_HINTS.iter().any(|hint| path.contains(hint)) {
        base += 10;
    }
    if path.matches('/').count() > 6 {
        base -= 10;
    }
    if parsed.query().map(str::len).unwrap_or(0) > 80 {
        base -= 10;
    }
    base.clamp(10, 100)
}

/// Pagination candidates derived from the current URL: three increments of
/// any recognized page/offset parameter.
pub fn pagination_candidates(url: &str) -> Vec<String> {
    static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
        vec![
            (Regex::new(r"([?&])page=(\d+)").expect("pagination regex"), "page"),
            (Regex::new(r"/page/(\d+)/?$").expect("pagination regex"), "slashpage"),
            (Regex::new(r"([?&])p=(\d+)").expect("pagination regex"), "p"),
            (Regex::new(r"([?&])offset=(\d+)").expect("pagination regex"), "offset"),
            (Regex::new(r"([?&])start=(\d+)").expect("pagination regex"), "start"),
        ]
    });

    let mut candidates = Vec::new();
    for (pattern, kind) in PATTERNS.iter() {
        let Some(caps) = pattern.captures(url) else {
            continue;
        };
        let number_group = if *kind == "slashpage" { 1 } else { 2 };
        let Some(current) = caps.get(number_group).and_then(|m| m.as_str().parse::<u64>().ok())
        else {
            continue;
        };
        for next in current + 1..current + 4 {
            let candidate = if *kind == "slashpage" {
                pattern.replace(url, format!("/page/{next}")).into_owned()
            } else {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("?");
                pattern
                    .replace(url, format!("{prefix}{kind}={next}"))
                    .into_owned()
            };
            if let Some(canonical) = canonicalize(&candidate) {
                candidates.push(canonical);
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragments_and_tracking_params() {
        let url = "https://x.test/a?utm_source=tw&id=7&fbclid=abc&hsa_cam=1#section";
        assert_eq!(canonicalize(url).unwrap(), "https://x.test/a?id=7");
    }

    #[test]
    fn collapses_double_slashes() {
        assert_eq!(
            canonicalize("https://x.test//a///b").unwrap(),
            "https://x.test/a/b"
        );
    }

    #[test]
    fn adds_scheme_when_missing() {
        assert_eq!(canonicalize("x.test/a").unwrap(), "https://x.test/a");
    }

    #[test]
    fn binary_extensions_are_skipped() {
        assert!(!should_process("https://x.test/report.pdf", "x.test"));
        assert!(!should_process("https://x.test/logo.PNG", "x.test"));
        assert!(should_process("https://x.test/about", "x.test"));
    }

    #[test]
    fn out_of_domain_urls_are_skipped() {
        assert!(!should_process("https://other.test/about", "x.test"));
    }

    #[test]
    fn very_long_urls_are_skipped() {
        let url = format!("https://x.test/{}", "a".repeat(2_100));
        assert!(!should_process(&url, "x.test"));
    }

    #[test]
    fn admin_and_feed_links_are_not_followed() {
        assert!(!should_follow("https://x.test/wp-admin/options.php"));
        assert!(!should_follow("https://x.test/feed/"));
        assert!(should_follow("https://x.test/blog/post"));
    }

    #[test]
    fn priority_prefers_content_paths() {
        assert!(link_priority("https://x.test/about") > link_priority("https://x.test/x"));
        let deep = "https://x.test/a/b/c/d/e/f/g/h";
        assert!(link_priority(deep) < 50);
    }

    #[test]
    fn pagination_candidates_increment() {
        let candidates = pagination_candidates("https://x.test/list?page=2");
        assert_eq!(candidates.len(), 3);
        assert!(candidates[0].ends_with("page=3"));
        assert!(candidates[2].ends_with("page=5"));

        let slash = pagination_candidates("https://x.test/blog/page/4");
        assert!(slash.iter().any(|c| c.ends_with("/page/5")));

        assert!(pagination_candidates("https://x.test/no-pages").is_empty());
    }
}
