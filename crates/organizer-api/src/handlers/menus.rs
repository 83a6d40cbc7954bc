// ============================================================================
// Organizer API - Menu Handlers
// File: crates/organizer-api/src/handlers/menus.rs
// ============================================================================
//! Menu HTTP handlers. Applied mutations answer 200/201, queued ones 202.
//! Bodies are validated by the gateway, which audits every rejection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use organizer_core::domain::{AppliedChange, Menu, MutationOutcome};
use organizer_core::repositories::MenuStore;
use organizer_shared::EntityId;
use tracing::debug;

use crate::dto::{CreateMenuRequest, ReorderRequest, UpdateMenuRequest};
use crate::error::ApiError;
use crate::extract::AuthIdentity;
use crate::response::ApiResponse;
use crate::state::AppState;

type MutationReply = (StatusCode, Json<ApiResponse<MutationOutcome<AppliedChange>>>);

fn reply(outcome: MutationOutcome<AppliedChange>, applied: StatusCode) -> MutationReply {
    let status = if outcome.is_queued() { StatusCode::ACCEPTED } else { applied };
    (status, Json(ApiResponse::success(outcome)))
}

/// GET /api/v1/menus
pub async fn list_menus<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Json<ApiResponse<Vec<Menu>>>, ApiError> {
    let menus = state.gateway.list_menus(&identity).await?;
    debug!(identity = %identity, count = menus.len(), "Listed menus");
    Ok(Json(ApiResponse::success(menus)))
}

/// POST /api/v1/menus
pub async fn create_menu<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
    Json(payload): Json<CreateMenuRequest>,
) -> Result<MutationReply, ApiError> {
    let outcome = state.gateway.create_menu(&identity, payload.into()).await?;
    Ok(reply(outcome, StatusCode::CREATED))
}

/// PATCH /api/v1/menus/{id}
pub async fn update_menu<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
    Path(menu_id): Path<EntityId>,
    Json(payload): Json<UpdateMenuRequest>,
) -> Result<MutationReply, ApiError> {
    let outcome = state.gateway.update_menu(&identity, menu_id, payload.into()).await?;
    Ok(reply(outcome, StatusCode::OK))
}

/// DELETE /api/v1/menus/{id}
pub async fn delete_menu<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
    Path(menu_id): Path<EntityId>,
) -> Result<MutationReply, ApiError> {
    let outcome = state.gateway.delete_menu(&identity, menu_id).await?;
    Ok(reply(outcome, StatusCode::OK))
}

/// PUT /api/v1/menus/order
pub async fn reorder_menus<S: MenuStore + 'static>(
    State(state): State<AppState<S>>,
    AuthIdentity(identity): AuthIdentity,
    Json(payload): Json<ReorderRequest>,
) -> Result<MutationReply, ApiError> {
    let outcome = state.gateway.reorder_menus(&identity, payload.orders).await?;
    Ok(reply(outcome, StatusCode::OK))
}
