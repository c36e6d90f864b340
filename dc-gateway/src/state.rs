//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use docent::config::ServiceSecret;
use docent::registry::TenantRegistry;
use tracing::info;

/// Schedules delayed process exits for the restart endpoints.
///
/// Exit code 1 means "restart me": the auto-restart wrapper respawns the
/// process on any non-zero code, which reloads every vector store from
/// disk. Disabled in tests.
#[derive(Clone, Debug)]
pub struct RestartHandle {
    enabled: bool,
}

impl RestartHandle {
    pub fn process_exit() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Exits the process with `code` after `delay`, once the response has
    /// gone out.
    pub fn schedule(&self, delay: Duration, code: i32) {
        info!(delay_ms = delay.as_millis() as u64, code, "process restart scheduled");
        if !self.enabled {
            return;
        }
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            std::process::exit(code);
        });
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TenantRegistry>,
    pub secret: ServiceSecret,
    /// Telemetry placeholder surfaced by `/health`; never enforced.
    pub requests_served: Arc<AtomicU64>,
    pub restart: RestartHandle,
}

impl AppState {
    pub fn new(registry: Arc<TenantRegistry>, secret: ServiceSecret, restart: RestartHandle) -> Self {
        Self {
            registry,
            secret,
            requests_served: Arc::new(AtomicU64::new(0)),
            restart,
        }
    }
}
