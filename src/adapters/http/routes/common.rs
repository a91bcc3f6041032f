//! Shared types and helpers for billing routes.

// Core framework - re-exported for use by sibling modules
pub use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
pub use serde::{Deserialize, Serialize};
pub use tracing::error;
pub use uuid::Uuid;

// App-level imports
pub use crate::adapters::http::app_state::AppState;
pub use crate::app_error::{AppError, AppResult};
pub use crate::application::jwt::{self, AuthenticatedUser};

/// Resolve the caller from the `Authorization: Bearer <token>` header.
/// Missing header, malformed token, and bad signature all surface as 401.
pub(crate) fn require_user(app_state: &AppState, headers: &HeaderMap) -> AppResult<AuthenticatedUser> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidCredentials)?;

    let token = header.strip_prefix("Bearer ").unwrap_or(header);

    let claims = jwt::verify(token, &app_state.config.jwt_secret)?;
    AuthenticatedUser::try_from(claims)
}
