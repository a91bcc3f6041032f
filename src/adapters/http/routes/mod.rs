use axum::{Json, Router, http::StatusCode};

use crate::adapters::http::app_state::AppState;

pub mod billing;
pub mod common;
pub mod webhooks;

/// JSON body for requests hitting a known path with the wrong method.
async fn method_not_allowed() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(billing::router())
        .merge(webhooks::router())
        .method_not_allowed_fallback(method_not_allowed)
}
