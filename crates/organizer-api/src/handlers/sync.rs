use axum::{extract::State, Json};
use organizer_core::repositories::MenuStore;
use organizer_core::services::SyncReport;
use tracing::info;

use crate::dto::PendingResponse;
use crate::error::ApiError;
use crate::extract::AuthIdentity;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/sync/pending
pub async fn pending<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
) -> Json<ApiResponse<PendingResponse>> {
    let actions = state.gateway.pending_actions(&identity).await;
    Json(ApiResponse::success(PendingResponse {
        has_pending: !actions.is_empty(),
        count: actions.len(),
        actions,
    }))
}

/// POST /api/v1/sync
pub async fn sync_now<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    if !state.gateway.network().is_usable() {
        return Err(ApiError::Store("Store is not reachable, sync postponed".into()));
    }
    let report = state.reconciler.sync_offline_actions(&identity).await;
    info!(identity = %identity, processed = report.processed, failed = report.failed, "Manual sync");
    Ok(Json(ApiResponse::success(report)))
}
