//! Request extractors

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use organizer_core::repositories::MenuStore;
use organizer_shared::Identity;

use crate::error::ApiError;
use crate::state::AppState;

/// Identity proven by the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthIdentity(pub Identity);

impl<S: MenuStore + 'static> FromRequestParts<AppState<S>> for AuthIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".into()))?;

        state
            .jwt
            .verify_identity(token.trim())
            .map(AuthIdentity)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))
    }
}
