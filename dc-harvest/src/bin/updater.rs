//! Incremental-update entrypoint: re-crawls a tenant's site, consults the
//! URL-tracking rows, and re-embeds only new or modified pages.

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
#[command(name = "dc-updater", about = "Run one incremental update for a tenant")]
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
            error!(error = %e, "updater failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &CrawlArgs) -> Result<ExitCode, HarvestError> {
    let config = args.crawl_config()?;

    let record_store_uri = args.record_store_uri.clone().ok_or_else(|| {
        HarvestError::Arguments(
            "record-store-uri is required for incremental updates (change detection)".into(),
        )
    })?;
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

    let records = RecordStore::connect(&tenant)
        .await
        .map_err(|e| HarvestError::Storage(e.to_string()))?;

    let crawler = Crawler::new(
        &tenant,
        &args.collection_name,
        embedder,
        config.clone(),
        Some(records),
        None,
    )
    .await?;

    info!(
        resource_id = %args.resource_id,
        start_url = %args.start_url,
        url_tracking = %tenant.url_tracking_table(),
        "updater starting"
    );

    let crawl = crawler.run();
    tokio::select! {
        result = crawl => {
            let (status, stats, code) = match result {
                Ok(stats) => ("completed", Some(stats), ExitCode::SUCCESS),
                Err(e) => {
                    error!(error = %e, "update failed");
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
                url_tracking_collection: Some(tenant.url_tracking_table()),
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
