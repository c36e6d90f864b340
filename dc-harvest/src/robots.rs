//! Minimal robots.txt handling for the opt-in flag.
//!
//! Only `Disallow` prefixes from `User-agent: *` groups are honoured;
//! anything beyond that is out of scope for the crawler.

#[derive(Clone, Debug, Default)]
pub struct RobotsPolicy {
    disallowed: Vec<String>,
}

impl RobotsPolicy {
    pub fn parse(body: &str) -> Self {
        let mut disallowed = Vec::new();
        let mut applies = false;
        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match field.trim().to_lowercase().as_str() {
                "user-agent" => applies = value == "*",
                "disallow" if applies && !value.is_empty() => {
                    disallowed.push(value.to_string());
                }
                _ => {}
            }
        }
        Self { disallowed }
    }

    pub fn allows(&self, path: &str) -> bool {
        !self.disallowed.iter().any(|prefix| path.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honours_wildcard_group_only() {
        let policy = RobotsPolicy::parse(
            "User-agent: googlebot\nDisallow: /only-google\n\nUser-agent: *\nDisallow: /private\nDisallow: /tmp\n",
        );
        assert!(!policy.allows("/private/page"));
        assert!(!policy.allows("/tmp"));
        assert!(policy.allows("/only-google"));
        assert!(policy.allows("/public"));
    }

    #[test]
    fn empty_disallow_allows_everything() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow:\n");
        assert!(policy.allows("/anything"));
    }
}
