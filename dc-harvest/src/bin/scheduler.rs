//! Per-tenant scheduler supervisor.
//!
//! Long-lived process that spawns one `dc-updater` subprocess per tick.
//! After a successful update it first triggers a retrieval-service restart
//! (mandatory) and only then notifies the admin backend that the scrape
//! completed; an updater failure is reported without the restart step.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tokio::process::Command;
use tracing::{error, info, warn};

use dc_harvest::cli::CrawlArgs;
use dc_harvest::error::HarvestError;

const RESTART_TIMEOUT: Duration = Duration::from_secs(30);
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "dc-scheduler", about = "Persistent scheduler supervisor for a tenant updater")]
struct Cli {
    #[command(flatten)]
    args: CrawlArgs,

    /// Minutes between update ticks
    #[arg(long, default_value_t = 5)]
    interval_minutes: u64,

    /// Run the updater immediately on startup before the first tick
    #[arg(long)]
    run_immediately: bool,
}

struct Endpoints {
    bot_url: String,
    admin_backend_url: String,
    service_secret: String,
}

impl Endpoints {
    fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            bot_url: std::env::var("BOT_URL").unwrap_or_else(|_| "http://localhost:8000".into()),
            admin_backend_url: std::env::var("ADMIN_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            service_secret: std::env::var("SERVICE_SECRET").unwrap_or_default(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.args.init_logging();

    if let Err(e) = cli.args.crawl_config() {
        error!(error = %e, "bad arguments");
        println!(
            "{}",
            json!({ "status": "failed", "error": e.to_string(), "timestamp": Utc::now().to_rfc3339() })
        );
        return ExitCode::from(2);
    }

    let endpoints = Endpoints::from_env();
    let pid = std::process::id();
    let pid_file = PathBuf::from(&cli.args.vector_store_path).join("scheduler.pid");

    if let Err(e) = std::fs::create_dir_all(&cli.args.vector_store_path)
        .and_then(|_| std::fs::write(&pid_file, pid.to_string()))
    {
        warn!(path = %pid_file.display(), error = %e, "could not write PID file");
    } else {
        info!(path = %pid_file.display(), "PID file written");
    }

    info!(
        resource_id = %cli.args.resource_id,
        start_url = %cli.args.start_url,
        interval_minutes = cli.interval_minutes,
        pid,
        "scheduler supervisor starting"
    );
    println!(
        "{}",
        json!({
            "status": "started",
            "pid": pid,
            "resource_id": cli.args.resource_id,
            "interval_minutes": cli.interval_minutes,
            "timestamp": Utc::now().to_rfc3339(),
        })
    );

    if cli.run_immediately {
        info!("running updater immediately as requested");
        run_tick(&cli, &endpoints).await;
    }

    let interval = Duration::from_secs(cli.interval_minutes * 60);
    let mut shutdown = false;
    while !shutdown {
        // Sleep in one-second slices so termination signals are honoured
        // within a second.
        let mut remaining = interval;
        while remaining > Duration::ZERO {
            let slice = remaining.min(Duration::from_secs(1));
            tokio::select! {
                _ = tokio::time::sleep(slice) => remaining -= slice,
                _ = shutdown_signal() => {
                    shutdown = true;
                    break;
                }
            }
        }
        if shutdown {
            break;
        }
        run_tick(&cli, &endpoints).await;
    }

    info!("shutting down scheduler");
    if pid_file.exists() {
        if let Err(e) = std::fs::remove_file(&pid_file) {
            warn!(error = %e, "could not remove PID file");
        }
    }
    println!(
        "{}",
        json!({
            "status": "stopped",
            "pid": pid,
            "resource_id": cli.args.resource_id,
            "timestamp": Utc::now().to_rfc3339(),
        })
    );
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// One scheduled tick: spawn the updater, then run the notification
/// protocol against its outcome.
async fn run_tick(cli: &Cli, endpoints: &Endpoints) {
    let job_id = format!(
        "scheduled_{}_{}",
        cli.args.resource_id,
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    info!(job_id = %job_id, "starting scheduled updater job");

    let success = match spawn_updater(cli, &job_id).await {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, "failed to spawn updater subprocess");
            false
        }
    };

    if success {
        info!("updater job completed successfully");
        // Restart is mandatory: without it the retrieval service keeps
        // serving stale vectors, so the backend is only told about
        // completed scrapes whose restart went through.
        match trigger_bot_restart(endpoints).await {
            Ok(()) => notify_scrape_complete(cli, endpoints, true).await,
            Err(e) => {
                error!(error = %e, "bot restart failed; backend will not be notified");
            }
        }
    } else {
        error!("updater job failed");
        notify_scrape_complete(cli, endpoints, false).await;
    }
}

/// Spawns one `dc-updater` run. Success iff the process exits 0.
async fn spawn_updater(cli: &Cli, job_id: &str) -> Result<bool, HarvestError> {
    let updater = sibling_binary("dc-updater")?;
    let mut command = Command::new(updater);
    command
        .arg("--start-url")
        .arg(&cli.args.start_url)
        .arg("--resource-id")
        .arg(&cli.args.resource_id)
        .arg("--vector-store-path")
        .arg(&cli.args.vector_store_path)
        .arg("--collection-name")
        .arg(&cli.args.collection_name)
        .arg("--job-id")
        .arg(job_id)
        .arg("--log-level")
        .arg(&cli.args.log_level);
    if let Some(domain) = &cli.args.domain {
        command.arg("--domain").arg(domain);
    }
    if let Some(user_id) = &cli.args.user_id {
        command.arg("--user-id").arg(user_id);
    }
    if let Some(model) = &cli.args.embedding_model_name {
        command.arg("--embedding-model-name").arg(model);
    }
    if let Some(uri) = &cli.args.record_store_uri {
        command.arg("--record-store-uri").arg(uri);
    }
    if let Some(sitemap) = &cli.args.sitemap_url {
        command.arg("--sitemap-url").arg(sitemap);
    }
    command
        .arg("--max-depth")
        .arg(cli.args.max_depth.to_string())
        .arg("--max-links-per-page")
        .arg(cli.args.max_links_per_page.to_string());
    if cli.args.no_respect_robots {
        command.arg("--no-respect-robots");
    }
    if cli.args.no_aggressive_discovery {
        command.arg("--no-aggressive-discovery");
    }

    let status = command
        .status()
        .await
        .map_err(|e| HarvestError::Arguments(format!("spawn dc-updater: {e}")))?;
    Ok(status.success())
}

fn sibling_binary(name: &str) -> Result<PathBuf, HarvestError> {
    let current = std::env::current_exe()
        .map_err(|e| HarvestError::Arguments(format!("current_exe: {e}")))?;
    Ok(current
        .parent()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name)))
}

/// Mandatory post-scrape restart of the retrieval service.
async fn trigger_bot_restart(endpoints: &Endpoints) -> Result<(), HarvestError> {
    let url = format!("{}/system/restart", endpoints.bot_url);
    info!(%url, "triggering retrieval service restart");

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .header("x-service-secret", &endpoints.service_secret)
        .timeout(RESTART_TIMEOUT)
        .send()
        .await
        .map_err(|e| HarvestError::Fetch(format!("restart call: {e}")))?;

    if !response.status().is_success() {
        return Err(HarvestError::Fetch(format!(
            "restart endpoint returned {}",
            response.status()
        )));
    }
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    info!(pid = body.get("pid").and_then(|v| v.as_u64()).unwrap_or(0), "restart acknowledged");
    Ok(())
}

/// Completion notification to the admin backend. Failures here are logged
/// and tolerated.
async fn notify_scrape_complete(cli: &Cli, endpoints: &Endpoints, success: bool) {
    let url = format!(
        "{}/api/scrape/scheduler/scrape-complete",
        endpoints.admin_backend_url
    );
    let payload = json!({
        "resource_id": cli.args.resource_id,
        "success": success,
        "bot_ready": success,
        "trigger": "scheduler",
        "completed_at": Utc::now().to_rfc3339(),
    });

    let client = reqwest::Client::new();
    match client
        .post(&url)
        .header("x-service-secret", &endpoints.service_secret)
        .json(&payload)
        .timeout(NOTIFY_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            info!("admin backend notified of scrape completion");
        }
        Ok(response) => warn!(status = %response.status(), "backend notification rejected"),
        Err(e) => warn!(error = %e, "could not reach admin backend"),
    }
}
