//! Shared CLI argument surface for the spider, updater, and scheduler.
//!
//! Exit codes across all entrypoints: 0 success, 1 failure, 2 bad
//! arguments, 130 interrupted.

use clap::Args;
use serde::Serialize;
use url::Url;

use crate::crawler::{CrawlConfig, CrawlStats};
use crate::error::HarvestError;

/// Arguments common to every crawl entrypoint.
#[derive(Args, Clone, Debug)]
pub struct CrawlArgs {
    /// Seed URL that defines the crawl scope
    #[arg(long)]
    pub start_url: String,

    /// Allowed domain (default derived from start-url)
    #[arg(long)]
    pub domain: Option<String>,

    /// Tenant resource identifier
    #[arg(long)]
    pub resource_id: String,

    /// Tenant user identifier
    #[arg(long)]
    pub user_id: Option<String>,

    /// Tenant-specific vector store directory
    #[arg(long)]
    pub vector_store_path: String,

    /// Vector collection name
    #[arg(long, default_value = "scraped_content")]
    pub collection_name: String,

    /// Embedding model name forwarded to the embedding server
    #[arg(long)]
    pub embedding_model_name: Option<String>,

    /// Record store URI for URL tracking (env: DOCENT_RECORD_STORE_URI)
    #[arg(long, env = "DOCENT_RECORD_STORE_URI")]
    pub record_store_uri: Option<String>,

    /// Maximum crawl depth
    #[arg(long, default_value_t = 999)]
    pub max_depth: usize,

    /// Outgoing link cap per page
    #[arg(long, default_value_t = 1_000)]
    pub max_links_per_page: usize,

    /// Optional sitemap URL to prime discovery
    #[arg(long)]
    pub sitemap_url: Option<String>,

    /// Respect robots.txt during the crawl
    #[arg(long, overrides_with = "no_respect_robots")]
    pub respect_robots: bool,

    /// Ignore robots.txt during the crawl
    #[arg(long, overrides_with = "respect_robots")]
    pub no_respect_robots: bool,

    /// Enable aggressive link discovery (default)
    #[arg(long, overrides_with = "no_aggressive_discovery")]
    pub aggressive_discovery: bool,

    /// Disable aggressive link discovery
    #[arg(long, overrides_with = "aggressive_discovery")]
    pub no_aggressive_discovery: bool,

    /// Optional job identifier for tracking
    #[arg(long)]
    pub job_id: Option<String>,

    /// Log level filter (e.g. info, dc_harvest=debug)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Optional path to write the JSON stats summary
    #[arg(long)]
    pub stats_output: Option<String>,
}

impl CrawlArgs {
    /// Validates and derives the effective crawl configuration.
    pub fn crawl_config(&self) -> Result<CrawlConfig, HarvestError> {
        if !self.start_url.to_lowercase().starts_with("http://")
            && !self.start_url.to_lowercase().starts_with("https://")
        {
            return Err(HarvestError::Arguments(
                "start-url must include http:// or https://".into(),
            ));
        }

        let domain = match &self.domain {
            Some(domain) => normalize_domain(domain),
            None => {
                let parsed = Url::parse(&self.start_url)
                    .map_err(|e| HarvestError::Arguments(format!("start-url: {e}")))?;
                parsed
                    .host_str()
                    .map(str::to_string)
                    .ok_or_else(|| {
                        HarvestError::Arguments("unable to derive domain from start-url".into())
                    })?
            }
        };

        let mut config = CrawlConfig::new(domain, self.start_url.clone());
        config.sitemap_url = self.sitemap_url.clone();
        config.max_depth = self.max_depth;
        config.max_links_per_page = self.max_links_per_page;
        config.job_id = self.job_id.clone();
        if self.no_respect_robots {
            config.respect_robots = false;
        }
        if self.no_aggressive_discovery {
            config.aggressive_discovery = false;
        }
        Ok(config)
    }

    pub fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_new(&self.log_level)
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// JSON summary printed on stdout at the end of a run.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub status: &'a str,
    pub resource_id: &'a str,
    pub user_id: Option<&'a str>,
    pub job_id: Option<&'a str>,
    pub start_url: &'a str,
    pub domain: &'a str,
    pub vector_store_path: &'a str,
    pub collection_name: &'a str,
    pub url_tracking_collection: Option<String>,
    pub stats: Option<CrawlStats>,
    pub timestamp: String,
}

impl RunSummary<'_> {
    pub fn emit(&self, stats_output: Option<&str>) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".into());
        if let Some(path) = stats_output {
            if let Err(e) = std::fs::write(path, serde_json::to_string_pretty(self).unwrap_or_default())
            {
                tracing::warn!(path, error = %e, "unable to write stats output");
            }
        }
        println!("{json}");
    }
}

/// Strips scheme and port from a domain argument.
fn normalize_domain(domain: &str) -> String {
    let trimmed = domain
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    trimmed
        .split('/')
        .next()
        .unwrap_or(trimmed)
        .split(':')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CrawlArgs,
    }

    fn parse(extra: &[&str]) -> CrawlArgs {
        let mut argv = vec![
            "test",
            "--start-url",
            "https://x.test/",
            "--resource-id",
            "t1",
            "--vector-store-path",
            "/tmp/v",
        ];
        argv.extend_from_slice(extra);
        TestCli::parse_from(argv).args
    }

    #[test]
    fn domain_is_derived_from_start_url() {
        let config = parse(&[]).crawl_config().unwrap();
        assert_eq!(config.domain, "x.test");
        assert!(config.respect_robots);
        assert!(config.aggressive_discovery);
    }

    #[test]
    fn explicit_domain_is_normalized() {
        let config = parse(&["--domain", "https://x.test:8080/path"])
            .crawl_config()
            .unwrap();
        assert_eq!(config.domain, "x.test");
    }

    #[test]
    fn negation_flags_win() {
        let config = parse(&["--no-respect-robots", "--no-aggressive-discovery"])
            .crawl_config()
            .unwrap();
        assert!(!config.respect_robots);
        assert!(!config.aggressive_discovery);
    }

    #[test]
    fn start_url_requires_scheme() {
        let mut args = parse(&[]);
        args.start_url = "x.test/path".into();
        assert!(matches!(
            args.crawl_config(),
            Err(HarvestError::Arguments(_))
        ));
    }
}
