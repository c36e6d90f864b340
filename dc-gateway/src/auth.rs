//! Shared-secret gate for inter-service calls.
//!
//! Compared in constant time. Enforcement is off entirely when the secret
//! is unset or a placeholder, so local development needs no configuration.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_service_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.secret.enforced() {
        let provided = request
            .headers()
            .get("x-service-secret")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing service authentication".into()))?;
        if !state.secret.matches(provided) {
            return Err(ApiError::Unauthorized("Invalid service authentication".into()));
        }
    }
    Ok(next.run(request).await)
}
