//! HTTP edge for the retrieval service.
//!
//! Routes requests to the tenant registry, enforces the shared-secret
//! gate on everything except liveness, and exposes the freshness
//! endpoints in increasing order of force: mark dirty, refresh cache,
//! restart the process.

pub mod api;
pub mod auth;
pub mod error;
pub mod state;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full service router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/chat", post(api::chat))
        .route("/api/bots/{resource_id}/chat", post(api::chat_with_resource))
        .route("/contact-info", get(api::contact_info))
        .route("/leads", get(api::leads))
        .route("/leads/count", get(api::leads_count))
        .route("/refresh-cache", post(api::refresh_cache))
        .route("/reload_vectors", post(api::reload_vectors))
        .route("/mark-data-updated", post(api::mark_data_updated))
        .route("/system/restart", post(api::system_restart))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_service_secret,
        ));

    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
