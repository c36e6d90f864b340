//! Initial-scrape entrypoint: crawls a tenant's site and indexes every
//! page. URL tracking is recorded when a record store URI is supplied, so
//! a later incremental run starts warm.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use dc_harvest::cli::{CrawlArgs, RunSummary};
use dc_harvest::crawler::Crawler;
use dc_harvest::error::HarvestError;
use docent::models::http::HttpEmbedder;
use docent::stores::RecordStore;
use docent::tenant::TenantContext;

#[derive(Parser, Debug)]
#[command(name = "dc-spider", about = "Run the initial scrape for a tenant")]
struct Cli {
    #[command(flatten)]
    args: CrawlArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.args.init_logging();

    match run(&cli.args).await {
        Ok(code) => code,
        Err(HarvestError::Arguments(message)) => {
            error!(%message, "bad arguments");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "spider failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &CrawlArgs) -> Result<ExitCode, HarvestError> {
    let config = args.crawl_config()?;

    // The spider tolerates a missing record store: URL tracking is only
    // needed once incremental updates begin. The placeholder URI is never
    // opened in that case.
    let record_store_uri = args
        .record_store_uri
        .clone()
        .unwrap_or_else(|| "sqlite::memory:".into());
    let tenant = TenantContext::new(&args.resource_id, &args.vector_store_path, record_store_uri)
        .map_err(|e| HarvestError::Arguments(e.to_string()))?;

    // Writes must use the same embedding function the query path uses.
    dotenvy::dotenv().ok();
    let embed_url = std::env::var("DOCENT_EMBED_URL")
        .map_err(|_| HarvestError::Arguments("DOCENT_EMBED_URL is not set".into()))?;
    let embedder = Arc::new(HttpEmbedder::new(
        reqwest::Client::new(),
        embed_url,
        args.embedding_model_name
            .clone()
            .or_else(|| std::env::var("DOCENT_EMBEDDING_MODEL").ok()),
    ));

    let records = match &args.record_store_uri {
        Some(_) => Some(
            RecordStore::connect(&tenant)
                .await
                .map_err(|e| HarvestError::Storage(e.to_string()))?,
        ),
        None => {
            warn!("no record store configured; URL tracking disabled for this run");
            None
        }
    };
    let crawler = Crawler::new(
        &tenant,
        &args.collection_name,
        embedder,
        config.clone(),
        records,
        None,
    )
    .await?;

    info!(resource_id = %args.resource_id, start_url = %args.start_url, "spider starting");

    let crawl = crawler.run();
    tokio::select! {
        result = crawl => {
            let (status, stats, code) = match result {
                Ok(stats) => ("completed", Some(stats), ExitCode::SUCCESS),
                Err(e) => {
                    error!(error = %e, "crawl failed");
                    ("failed", None, ExitCode::FAILURE)
                }
            };
            RunSummary {
                status,
                resource_id: &args.resource_id,
                user_id: args.user_id.as_deref(),
                job_id: args.job_id.as_deref(),
                start_url: &args.start_url,
                domain: &config.domain,
                vector_store_path: &args.vector_store_path,
                collection_name: &args.collection_name,
                url_tracking_collection: args
                    .record_store_uri
                    .as_ref()
                    .map(|_| tenant.url_tracking_table()),
                stats,
                timestamp: Utc::now().to_rfc3339(),
            }
            .emit(args.stats_output.as_deref());
            Ok(code)
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
            Ok(ExitCode::from(130))
        }
    }
}
