use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use organizer_core::repositories::MenuStore;
use organizer_core::services::NetworkSnapshot;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    network: NetworkSnapshot,
}

/// GET /health
pub async fn health_check<S: MenuStore + 'static>(State(state): State<AppState<S>>) -> (StatusCode, Json<HealthResponse>) {
    let network = state.gateway.network().snapshot();
    let status = if network.is_usable() { "healthy" } else { "degraded" };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            network,
        }),
    )
}

/// GET /metrics
pub async fn metrics<S: MenuStore + 'static>(State(state): State<AppState<S>>) -> Result<Response, ApiError> {
    let body = state
        .gateway
        .metrics()
        .render()
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
