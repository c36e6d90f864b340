//! Retrieval service entrypoint.
//!
//! Exit code convention: 0 is a clean shutdown, 1 asks the auto-restart
//! wrapper to respawn the process (which reloads every vector store from
//! disk).

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dc_gateway::build_router;
use dc_gateway::state::{AppState, RestartHandle};
use docent::config::{ModelEndpoints, ServiceSecret};
use docent::models::http::build_clients;
use docent::registry::TenantRegistry;

#[derive(Parser, Debug)]
#[command(name = "dc-gateway", about = "Multi-tenant retrieval QA service")]
struct Cli {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "DOCENT_HOST")]
    host: String,

    /// Bind port
    #[arg(long, default_value_t = 8000, env = "DOCENT_PORT")]
    port: u16,

    /// Vector collection name
    #[arg(long, default_value = "scraped_content")]
    collection_name: String,

    /// Log level filter
    #[arg(long, default_value = "info", env = "DOCENT_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A missing model endpoint is a configuration blocker: abort start.
    let endpoints = match ModelEndpoints::from_env() {
        Ok(endpoints) => endpoints,
        Err(e) => {
            error!(error = %e, "startup blocked");
            return ExitCode::FAILURE;
        }
    };
    let (embedder, reranker, generator) = build_clients(&endpoints);

    let registry = Arc::new(TenantRegistry::new(
        cli.collection_name.clone(),
        Arc::new(embedder),
        Arc::new(reranker),
        Arc::new(generator),
    ));

    let secret = ServiceSecret::from_env();
    if secret.enforced() {
        info!("service-to-service authentication enforced");
    } else {
        info!("SERVICE_SECRET not set or placeholder; requests are not authenticated");
    }

    let state = AppState::new(Arc::clone(&registry), secret, RestartHandle::process_exit());
    let router = build_router(state);

    let addr: SocketAddr = match format!("{}:{}", cli.host, cli.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "invalid bind address");
            return ExitCode::from(2);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "retrieval service listening");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;

    registry.close_all().await;
    match served {
        Ok(()) => {
            info!("clean shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
