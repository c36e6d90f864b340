//! Request handlers for the endpoint table.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use docent::engine::Engine;
use docent::tenant::TenantContext;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub database_uri: Option<String>,
    #[serde(default)]
    pub vector_store_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Tenant context carried in query parameters by the non-chat endpoints.
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub vector_store_path: Option<String>,
    #[serde(default)]
    pub database_uri: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Validates the tenant triple out of whatever the request carried.
fn tenant_context(
    resource_id: Option<&str>,
    user_id: Option<&str>,
    vector_store_path: Option<&str>,
    database_uri: Option<&str>,
) -> Result<TenantContext, ApiError> {
    let vector_store_path = vector_store_path
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest(
                "vector_store_path is required. Tenant context must be provided explicitly.".into(),
            )
        })?;
    let database_uri = database_uri
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest(
                "database_uri is required. Tenant context must be provided explicitly.".into(),
            )
        })?;
    let identifier = resource_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| user_id.map(str::trim).filter(|s| !s.is_empty()))
        .ok_or_else(|| {
            ApiError::BadRequest("resource_id or user_id is required to identify the tenant.".into())
        })?;

    TenantContext::new(identifier, vector_store_path, database_uri).map_err(ApiError::from)
}

async fn resolve_engine(
    state: &AppState,
    ctx: &TenantContext,
) -> Result<Arc<Engine>, ApiError> {
    state.registry.get(ctx, false).await.map_err(ApiError::from)
}

/// Session ids that are absent or the literal `"default"` are replaced by
/// `{sanitized_resource_id}_{8-hex-chars}`.
fn session_identifier(incoming: Option<&str>, ctx: &TenantContext) -> String {
    match incoming.map(str::trim) {
        Some(session) if !session.is_empty() && !session.eq_ignore_ascii_case("default") => {
            session.to_string()
        }
        _ => {
            let base: String = ctx
                .resource_id
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
                .collect();
            let base = if base.is_empty() { "session".to_string() } else { base };
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("{base}_{}", &suffix[..8])
        }
    }
}

// ── Liveness ───────────────────────────────────────────────────────────

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "docent retrieval service", "status": "Ready" }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "chatbot_ready": true,
        "message": "retrieval engine ready",
        "daily_requests_used": state.requests_served.load(Ordering::Relaxed),
    }))
}

// ── Chat ───────────────────────────────────────────────────────────────

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    handle_chat(state, request).await
}

pub async fn chat_with_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Json(mut request): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    if request.resource_id.as_deref().map(str::trim).filter(|s| !s.is_empty()).is_none() {
        request.resource_id = Some(resource_id);
    }
    handle_chat(state, request).await
}

async fn handle_chat(
    state: AppState,
    request: QuestionRequest,
) -> Result<Json<AnswerResponse>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query text is required".into()));
    }

    let ctx = tenant_context(
        request.resource_id.as_deref(),
        request.user_id.as_deref(),
        request.vector_store_path.as_deref(),
        request.database_uri.as_deref(),
    )?;
    let session_id = session_identifier(request.session_id.as_deref(), &ctx);

    let engine = resolve_engine(&state, &ctx).await?;
    state.requests_served.fetch_add(1, Ordering::Relaxed);

    let answer = engine.chat(query, &session_id).await;

    let mut metadata = serde_json::Map::new();
    if let Some(resource_id) = &request.resource_id {
        metadata.insert("resource_id".into(), json!(resource_id));
    }
    if let Some(user_id) = &request.user_id {
        metadata.insert("user_id".into(), json!(user_id));
    }

    Ok(Json(AnswerResponse {
        answer,
        session_id,
        sources: None,
        metadata: if metadata.is_empty() { None } else { Some(Value::Object(metadata)) },
    }))
}

// ── Contact info & leads ───────────────────────────────────────────────

pub async fn contact_info(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_context(
        query.resource_id.as_deref(),
        query.user_id.as_deref(),
        query.vector_store_path.as_deref(),
        query.database_uri.as_deref(),
    )?;
    let engine = resolve_engine(&state, &ctx).await?;
    let (info, formatted) = engine
        .contact_report("contact information")
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({
        "emails": info.emails,
        "phones": info.phones,
        "addresses": info.addresses,
        "formatted_response": formatted,
    })))
}

pub async fn leads(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_context(
        query.resource_id.as_deref(),
        query.user_id.as_deref(),
        query.vector_store_path.as_deref(),
        query.database_uri.as_deref(),
    )?;
    let engine = resolve_engine(&state, &ctx).await?;
    let leads = engine.all_leads().await.map_err(ApiError::from)?;
    Ok(Json(json!({ "count": leads.len(), "leads": leads })))
}

pub async fn leads_count(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_context(
        query.resource_id.as_deref(),
        query.user_id.as_deref(),
        query.vector_store_path.as_deref(),
        query.database_uri.as_deref(),
    )?;
    let engine = resolve_engine(&state, &ctx).await?;
    let count = engine.leads_count().await.map_err(ApiError::from)?;
    Ok(Json(json!({ "count": count })))
}

// ── Freshness endpoints, in increasing order of force ──────────────────

/// Sets the dirty flag only; the next chat request reloads.
pub async fn mark_data_updated(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_context(
        query.resource_id.as_deref(),
        query.user_id.as_deref(),
        query.vector_store_path.as_deref(),
        query.database_uri.as_deref(),
    )?;
    state.registry.mark_dirty(&ctx).await;
    Ok(Json(json!({
        "status": "success",
        "message": "Data marked as updated. Next chat request will auto-reload.",
        "resource_id": ctx.resource_id,
    })))
}

/// Destroys and recreates the tenant's engine against current disk state.
pub async fn refresh_cache(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_context(
        query.resource_id.as_deref(),
        query.user_id.as_deref(),
        query.vector_store_path.as_deref(),
        query.database_uri.as_deref(),
    )?;

    info!(resource_id = %ctx.resource_id, "refresh-cache: destroying engine");
    let destroyed = state.registry.invalidate(&ctx).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let engine = state
        .registry
        .get(&ctx, true)
        .await
        .map_err(ApiError::from)?;
    let document_count = engine.document_count().await.map_err(ApiError::from)?;

    Ok(Json(json!({
        "status": "success",
        "message": "Engine destroyed and recreated with fresh on-disk data",
        "resource_id": ctx.resource_id,
        "document_count": document_count,
        "destroyed": destroyed,
    })))
}

/// Schedules a full process restart so every vector store reloads cleanly.
pub async fn reload_vectors(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, ApiError> {
    let tenant_identifier = query
        .resource_id
        .clone()
        .or(query.user_id.clone())
        .unwrap_or_default();

    info!(resource_id = %tenant_identifier, "reload_vectors: scheduling process restart");
    state.restart.schedule(Duration::from_millis(500), 1);

    Ok(Json(json!({
        "success": true,
        "message": "Restart initiated - all vector stores will reload from disk",
        "resource_id": tenant_identifier,
        "action_taken": "restart_scheduled",
    })))
}

/// Hard restart: exits with the restart code after one second.
pub async fn system_restart(State(state): State<AppState>) -> Json<Value> {
    let pid = std::process::id();
    info!(pid, "system restart requested");
    state.restart.schedule(Duration::from_secs(1), 1);
    Json(json!({ "status": "restarting", "pid": pid }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TenantContext {
        TenantContext::new("bot 7!", "/data/t", "sqlite://t.db").unwrap()
    }

    #[test]
    fn generated_session_ids_are_sanitized_and_suffixed() {
        let session = session_identifier(None, &ctx());
        let (base, suffix) = session.rsplit_once('_').unwrap();
        assert_eq!(base, "bot7");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

        let default = session_identifier(Some("default"), &ctx());
        assert!(default.starts_with("bot7_"));
    }

    #[test]
    fn explicit_session_ids_pass_through() {
        assert_eq!(session_identifier(Some("s-77"), &ctx()), "s-77");
    }

    #[test]
    fn tenant_context_requires_all_parts() {
        assert!(tenant_context(Some("r"), None, Some("/v"), Some("db")).is_ok());
        assert!(tenant_context(None, Some("u"), Some("/v"), Some("db")).is_ok());
        assert!(tenant_context(Some("r"), None, None, Some("db")).is_err());
        assert!(tenant_context(Some("r"), None, Some("/v"), None).is_err());
        assert!(tenant_context(None, None, Some("/v"), Some("db")).is_err());
    }
}
